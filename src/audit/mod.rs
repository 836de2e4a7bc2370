mod logger;

pub use logger::ExchangeLogger;
