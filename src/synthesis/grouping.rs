//! Identity resolution: grouping by normalised name

use crate::model::normalize_name;
use std::collections::HashMap;

/// Items sharing one normalised name, in first-seen order.
#[derive(Debug, Clone, PartialEq)]
pub struct Group<T> {
    pub key: String,
    pub members: Vec<T>,
}

impl<T> Group<T> {
    pub fn is_singleton(&self) -> bool {
        self.members.len() == 1
    }
}

/// Groups `items` by the normalised form of `name`.
///
/// Group order follows the first appearance of each key and members keep
/// their input order, so the result is deterministic for a given input.
pub fn group_by_name<T, F>(items: impl IntoIterator<Item = T>, name: F) -> Vec<Group<T>>
where
    F: Fn(&T) -> &str,
{
    let mut groups: Vec<Group<T>> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for item in items {
        let key = normalize_name(name(&item));
        match index.get(&key) {
            Some(&i) => groups[i].members.push(item),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(Group {
                    key,
                    members: vec![item],
                });
            }
        }
    }

    groups
}
