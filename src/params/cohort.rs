// src/params/cohort.rs

//! Operations over a whole cohort of parameter sets.
//!
//! The main one is name shortening: in a sweep where `lr` is always `0.1`,
//! every stage name would carry a useless `0.1_` segment. Shortening drops
//! such cohort-constant keys from each set's display-name key order.

use std::collections::{BTreeMap, BTreeSet};

use crate::params::set::ParamSet;
use crate::params::value::ParamValue;

/// Union of the keys of every set in the cohort.
pub fn all_keys(cohort: &[&ParamSet]) -> BTreeSet<String> {
    cohort
        .iter()
        .flat_map(|set| set.keys().map(str::to_string))
        .collect()
}

/// Keys that take more than one distinct value across the sets defining them.
pub fn nonunique_keys(cohort: &[&ParamSet]) -> BTreeSet<String> {
    let mut seen: BTreeMap<&str, Vec<&ParamValue>> = BTreeMap::new();
    for set in cohort {
        for (key, value) in set.iter() {
            let values = seen.entry(key).or_default();
            if !values.iter().any(|v| v.same_as(value)) {
                values.push(value);
            }
        }
    }

    seen.into_iter()
        .filter(|(_, values)| values.len() > 1)
        .map(|(key, _)| key.to_string())
        .collect()
}

/// Keys that stay in display names: the non-unique keys plus every initial
/// key declared by any member of the cohort.
pub fn kept_keys(cohort: &[&ParamSet]) -> BTreeSet<String> {
    let mut kept = nonunique_keys(cohort);
    for set in cohort {
        kept.extend(set.initial_keys().iter().cloned());
    }
    kept
}

/// Keys excluded from the name of at least one member.
pub fn exclude_name_keys(cohort: &[&ParamSet]) -> BTreeSet<String> {
    cohort
        .iter()
        .flat_map(|set| {
            let set: &ParamSet = set;
            set.keys().filter(move |k| set.is_name_excluded(k))
        })
        .map(str::to_string)
        .collect()
}

/// Shortened name key order for each member, in cohort order.
///
/// Computed from each set's natural order, so it does not matter whether a
/// set was shortened before, nor in which order the cohort is given.
pub fn shortened_key_orders(cohort: &[&ParamSet]) -> Vec<Vec<String>> {
    let kept = kept_keys(cohort);
    cohort
        .iter()
        .map(|set| {
            set.natural_key_order()
                .into_iter()
                .filter(|k| kept.contains(k))
                .collect()
        })
        .collect()
}

/// Assign shortened name key orders to every set of the cohort.
pub fn shorten_names(cohort: &mut [ParamSet]) {
    let orders = {
        let refs: Vec<&ParamSet> = cohort.iter().collect();
        shortened_key_orders(&refs)
    };
    for (set, order) in cohort.iter_mut().zip(orders) {
        set.set_key_order(Some(order));
    }
}

/// Sets whose values match every `(key, value)` filter.
pub fn subset<'a>(sets: &'a [ParamSet], filters: &[(&str, ParamValue)]) -> Vec<&'a ParamSet> {
    sets.iter()
        .filter(|set| {
            filters.iter().all(|(key, wanted)| match set.get(key) {
                Some(v) => v.same_as(wanted),
                None => wanted.is_null(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cohort() -> Vec<ParamSet> {
        (1..=3)
            .map(|seed| {
                let mut p = ParamSet::new();
                p.insert("lr", 0.1);
                p.insert("seed", seed);
                p
            })
            .collect()
    }

    #[test]
    fn constant_keys_are_dropped_from_names() {
        let mut sets = cohort();
        shorten_names(&mut sets);
        let names: Vec<String> = sets.iter().map(ParamSet::display_name).collect();
        assert_eq!(names, vec!["1", "2", "3"]);
    }

    #[test]
    fn initial_keys_survive_shortening() {
        let mut sets = cohort();
        sets[1] = sets[1].clone().with_initial_keys(["lr"]);
        shorten_names(&mut sets);
        assert_eq!(sets[0].display_name(), "0.1_1");
        assert_eq!(sets[1].display_name(), "0.1_2");
    }

    #[test]
    fn shortening_is_idempotent_and_order_independent() {
        let sets = cohort();
        let forward: Vec<&ParamSet> = sets.iter().collect();
        let backward: Vec<&ParamSet> = sets.iter().rev().collect();

        let a = shortened_key_orders(&forward);
        let mut b = shortened_key_orders(&backward);
        b.reverse();
        assert_eq!(a, b);

        let mut once = cohort();
        shorten_names(&mut once);
        let first: Vec<String> = once.iter().map(ParamSet::display_name).collect();
        shorten_names(&mut once);
        let second: Vec<String> = once.iter().map(ParamSet::display_name).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn key_defined_by_one_member_only_counts_as_constant() {
        let mut sets = cohort();
        sets[0].insert("extra", "yes");
        let refs: Vec<&ParamSet> = sets.iter().collect();
        assert!(!kept_keys(&refs).contains("extra"));
        assert!(kept_keys(&refs).contains("seed"));
    }

    #[test]
    fn subset_matches_numeric_values_loosely() {
        let sets = cohort();
        let picked = subset(&sets, &[("seed", ParamValue::Float(2.0))]);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].get_str("seed"), "2");
    }
}
