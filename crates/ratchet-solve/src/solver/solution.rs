use std::collections::{HashMap, HashSet, VecDeque};

use crate::package::PackageRecord;

/// Order a solution so dependencies come before their dependents.
///
/// One record is kept per name (the first seen). Virtual packages (`__*`) and
/// names outside the solution do not constrain the order; records caught in a
/// dependency cycle are appended in their original order.
pub fn order_records(records: Vec<PackageRecord>) -> Vec<PackageRecord> {
    let mut seen = HashSet::new();
    let records: Vec<PackageRecord> = records
        .into_iter()
        .filter(|record| seen.insert(record.name.clone()))
        .collect();

    if records.len() < 2 {
        return records;
    }

    let name_to_index: HashMap<&str, usize> = records
        .iter()
        .enumerate()
        .map(|(idx, record)| (record.name.as_str(), idx))
        .collect();

    // Edge dep -> dependent: installing dep unblocks the dependent
    let mut in_degree = vec![0usize; records.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); records.len()];

    for (idx, record) in records.iter().enumerate() {
        let deps: HashSet<&str> = record
            .dependency_names()
            .filter(|name| !name.starts_with("__"))
            .collect();
        for dep in deps {
            if let Some(&dep_idx) = name_to_index.get(dep) {
                if dep_idx != idx {
                    dependents[dep_idx].push(idx);
                    in_degree[idx] += 1;
                }
            }
        }
    }

    let mut queue: VecDeque<usize> = in_degree
        .iter()
        .enumerate()
        .filter(|&(_, &degree)| degree == 0)
        .map(|(idx, _)| idx)
        .collect();
    let mut order: Vec<usize> = Vec::with_capacity(records.len());

    while let Some(idx) = queue.pop_front() {
        order.push(idx);
        for &dependent in &dependents[idx] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                queue.push_back(dependent);
            }
        }
    }

    if order.len() != records.len() {
        log::debug!(
            "Dependency cycle among {} records, keeping their order",
            records.len() - order.len()
        );
        let placed: HashSet<usize> = order.iter().copied().collect();
        order.extend((0..records.len()).filter(|idx| !placed.contains(idx)));
    }

    let mut slots: Vec<Option<PackageRecord>> = records.into_iter().map(Some).collect();
    order
        .into_iter()
        .filter_map(|idx| slots[idx].take())
        .collect()
}
