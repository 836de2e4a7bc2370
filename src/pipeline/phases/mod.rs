// Pipeline phases for evidence synthesis
//
// Each phase reads what earlier phases left in the context and writes its own
// results back; none reads a later phase's output.

#[path = "00_search.rs"]
pub mod search;
#[path = "01_extract.rs"]
pub mod extract;
#[path = "02_rank.rs"]
pub mod rank;
#[path = "03_synthesize.rs"]
pub mod synthesize;
#[path = "04_enrich.rs"]
pub mod enrich;
