// src/params/set.rs

//! Ordered experiment parameter sets.
//!
//! A [`ParamSet`] drives two things downstream:
//! - the stage's display name (and therefore its directory and job name)
//! - the command-line arguments handed to the experiment binary
//!
//! Each set can also be dumped to (and read back from) a tab-separated
//! `expparams.txt` file that reporting tools scrape.

use std::collections::BTreeSet;
use std::fs;
use std::ops::Add;
use std::path::Path;

use anyhow::{anyhow, Context};

use crate::errors::Result;
use crate::params::value::ParamValue;

/// Prefix of the reserved keys that hold positional arguments.
pub const POSITIONAL_KEY_PREFIX: &str = "__arg__";

/// Conventional name of the parameter dump inside a stage directory.
pub const PARAMS_FILE: &str = "expparams.txt";

const DUMP_FIELD_SEP: &str = "\t";
const DUMP_LINE_SEP: char = '\n';

/// How a key and its value are joined on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArgStyle {
    /// `--key value`
    #[default]
    Space,
    /// `--key=value`
    Equals,
}

impl ArgStyle {
    fn separator(self) -> &'static str {
        match self {
            ArgStyle::Space => " ",
            ArgStyle::Equals => "=",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParamSet {
    /// Insertion-ordered entries; keys are unique.
    entries: Vec<(String, ParamValue)>,
    exclude_name: BTreeSet<String>,
    exclude_arg: BTreeSet<String>,
    /// Keys that lead the display name and survive cohort shortening.
    initial_keys: Vec<String>,
    /// Shortened name key order, once computed for a cohort.
    key_order: Option<Vec<String>>,
    arg_style: ArgStyle,
}

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from `(key, value)` pairs, all included in name and args.
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<ParamValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut set = Self::new();
        set.update(pairs);
        set
    }

    pub fn with_arg_style(mut self, style: ArgStyle) -> Self {
        self.arg_style = style;
        self
    }

    pub fn with_initial_keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.initial_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn arg_style(&self) -> ArgStyle {
        self.arg_style
    }

    pub fn initial_keys(&self) -> &[String] {
        &self.initial_keys
    }

    /// Set a value and decide whether it shows up in the name and the args.
    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<ParamValue>,
        include_in_name: bool,
        include_in_arg: bool,
    ) {
        let key = key.into();
        self.set_include_in_name(&key, include_in_name);
        self.set_include_in_arg(&key, include_in_arg);
        self.insert(key, value);
    }

    /// Set a value, leaving any name/arg exclusion for the key untouched.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Insert several values at once.
    pub fn update<K, V, I>(&mut self, pairs: I)
    where
        K: Into<String>,
        V: Into<ParamValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        for (k, v) in pairs {
            self.insert(k, v);
        }
    }

    pub fn set_include_in_name(&mut self, key: &str, include: bool) {
        if include {
            self.exclude_name.remove(key);
        } else {
            self.exclude_name.insert(key.to_string());
        }
    }

    pub fn set_include_in_arg(&mut self, key: &str, include: bool) {
        if include {
            self.exclude_arg.remove(key);
        } else {
            self.exclude_arg.insert(key.to_string());
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// String form of a value; missing keys render like `Null`.
    pub fn get_str(&self, key: &str) -> String {
        self.get(key).map(ToString::to_string).unwrap_or_default()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_name_excluded(&self, key: &str) -> bool {
        self.exclude_name.contains(key)
    }

    pub fn is_arg_excluded(&self, key: &str) -> bool {
        self.exclude_arg.contains(key)
    }

    /// Add a positional command-line argument (rendered without `--key`).
    pub fn add_arg(&mut self, arg: impl Into<ParamValue>) {
        // Past every existing positional index, so a removal never leads to reuse.
        let next = self
            .entries
            .iter()
            .filter_map(|(k, _)| k.strip_prefix(POSITIONAL_KEY_PREFIX)?.parse::<usize>().ok())
            .map(|i| i + 1)
            .max()
            .unwrap_or(0)
            .max(self.entries.len());
        let key = format!("{POSITIONAL_KEY_PREFIX}{next}");
        self.set(key, arg, true, true);
    }

    /// Combine two sets. `other` wins on conflicting keys; exclusions and
    /// initial keys are unioned; the argument style comes from `other`.
    pub fn concat(&self, other: &ParamSet) -> ParamSet {
        let mut out = self.clone();
        out.key_order = None;
        out.arg_style = other.arg_style;
        for (k, v) in &other.entries {
            out.insert(k.clone(), v.clone());
        }
        out.exclude_name.extend(other.exclude_name.iter().cloned());
        out.exclude_arg.extend(other.exclude_arg.iter().cloned());
        for key in &other.initial_keys {
            if !out.initial_keys.contains(key) {
                out.initial_keys.push(key.clone());
            }
        }
        out
    }

    /// A copy of this set with some values replaced or added.
    pub fn copy_with<K, V, I>(&self, pairs: I) -> ParamSet
    where
        K: Into<String>,
        V: Into<ParamValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut out = self.clone();
        out.key_order = None;
        out.update(pairs);
        out
    }

    /// Initial keys present in this set, then all remaining keys sorted.
    pub fn natural_key_order(&self) -> Vec<String> {
        let mut all: Vec<&str> = self.keys().collect();
        all.sort_unstable();

        let mut order: Vec<String> = self
            .initial_keys
            .iter()
            .filter(|k| self.contains_key(k))
            .cloned()
            .collect();
        for key in all {
            if !self.initial_keys.iter().any(|k| k == key) {
                order.push(key.to_string());
            }
        }
        order
    }

    /// The shortened order if one was assigned, else the natural order.
    pub fn name_key_order(&self) -> Vec<String> {
        match &self.key_order {
            Some(order) => order.clone(),
            None => self.natural_key_order(),
        }
    }

    pub(crate) fn set_key_order(&mut self, order: Option<Vec<String>>) {
        self.key_order = order;
    }

    /// Display name: name-included values in name key order, joined by `_`.
    /// Commas and path separators in values become `-`.
    pub fn display_name(&self) -> String {
        self.name_key_order()
            .iter()
            .filter(|k| !self.exclude_name.contains(k.as_str()))
            .map(|k| self.get_str(k).replace([',', '/'], "-"))
            .collect::<Vec<_>>()
            .join("_")
    }

    /// Command-line arguments: sorted `--key value` flags, then positionals
    /// in insertion order. Every entry is followed by a single space.
    pub fn argument_string(&self) -> String {
        let sep = self.arg_style.separator();
        let mut flags: Vec<&(String, ParamValue)> = self
            .entries
            .iter()
            .filter(|(k, _)| !self.exclude_arg.contains(k) && !is_positional(k))
            .collect();
        flags.sort_by(|a, b| a.0.cmp(&b.0));

        let mut args = String::new();
        for (key, value) in flags {
            if value.is_null() {
                args.push_str(&format!("--{key} "));
            } else {
                args.push_str(&format!("--{key}{sep}{value} "));
            }
        }
        for (key, value) in &self.entries {
            if !self.exclude_arg.contains(key) && is_positional(key) {
                args.push_str(&format!("{value} "));
            }
        }
        args
    }

    /// Render the tab-separated dump, one line per key in insertion order.
    pub fn to_dump(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.entries {
            let fields = [
                key.clone(),
                value.to_string(),
                bool_field(self.exclude_name.contains(key)).to_string(),
                bool_field(self.exclude_arg.contains(key)).to_string(),
            ];
            out.push_str(&fields.join(DUMP_FIELD_SEP));
            out.push(DUMP_LINE_SEP);
        }
        out
    }

    /// Merge entries parsed from a dump into this set.
    pub fn merge_dump(&mut self, dump: &str) -> Result<()> {
        for line in dump.split(DUMP_LINE_SEP) {
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(DUMP_FIELD_SEP).collect();
            let [key, value, exclude_name, exclude_arg] = fields.as_slice() else {
                return Err(anyhow!(
                    "malformed parameter line (expected 4 tab-separated fields): {line:?}"
                )
                .into());
            };
            self.insert(*key, ParamValue::coerce(value));
            if *exclude_name == "True" {
                self.exclude_name.insert(key.to_string());
            }
            if *exclude_arg == "True" {
                self.exclude_arg.insert(key.to_string());
            }
        }
        Ok(())
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_dump())
            .with_context(|| format!("writing parameter dump {:?}", path))?;
        Ok(())
    }

    pub fn read_from(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading parameter dump {:?}", path))?;
        self.merge_dump(&contents)
    }
}

impl Add for &ParamSet {
    type Output = ParamSet;

    fn add(self, rhs: &ParamSet) -> ParamSet {
        self.concat(rhs)
    }
}

impl Add for ParamSet {
    type Output = ParamSet;

    fn add(self, rhs: ParamSet) -> ParamSet {
        self.concat(&rhs)
    }
}

fn is_positional(key: &str) -> bool {
    key.starts_with(POSITIONAL_KEY_PREFIX)
}

fn bool_field(b: bool) -> &'static str {
    if b { "True" } else { "False" }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ParamSet {
        let mut p = ParamSet::from_pairs([("lr", ParamValue::Float(0.1))]);
        p.insert("seed", 3);
        p.insert("model", "crf");
        p
    }

    #[test]
    fn display_name_sorts_keys_and_skips_excluded() {
        let mut p = sample();
        assert_eq!(p.display_name(), "0.1_crf_3");

        p.set("threads", 4, false, true);
        assert_eq!(p.display_name(), "0.1_crf_3");
    }

    #[test]
    fn initial_keys_lead_the_name() {
        let p = sample().with_initial_keys(["seed", "missing"]);
        assert_eq!(p.natural_key_order(), vec!["seed", "lr", "model"]);
        assert_eq!(p.display_name(), "3_0.1_crf");
    }

    #[test]
    fn commas_are_replaced_in_names() {
        let p = ParamSet::from_pairs([("feats", "a,b,c")]);
        assert_eq!(p.display_name(), "a-b-c");
    }

    #[test]
    fn positionals_survive_removal_before_add() {
        let mut p = ParamSet::new();
        p.add_arg("a");
        p.add_arg("b");
        let first = p.keys().next().unwrap().to_string();
        p.remove(&first);
        p.add_arg("c");
        assert_eq!(p.len(), 2);
        assert_eq!(p.argument_string(), "b c ");
    }

    #[test]
    fn path_values_stay_a_single_name_component() {
        let p = ParamSet::from_pairs([("data", "/corpus/train.txt")]);
        assert_eq!(p.display_name(), "-corpus-train.txt");
    }

    #[test]
    fn argument_string_sorts_flags_then_positionals() {
        let mut p = sample();
        p.set("verbose", ParamValue::Null, true, true);
        p.set("work_mem_megs", 2048, true, false);
        p.add_arg("train.txt");
        p.add_arg("test.txt");

        assert_eq!(
            p.argument_string(),
            "--lr 0.1 --model crf --seed 3 --verbose train.txt test.txt "
        );

        let eq = p.with_arg_style(ArgStyle::Equals);
        assert!(eq.argument_string().starts_with("--lr=0.1 --model=crf"));
    }

    #[test]
    fn concat_prefers_right_hand_side_and_unions_exclusions() {
        let mut a = ParamSet::from_pairs([("lr", 0.1), ("seed", 1.0)]);
        a.set_include_in_name("seed", false);
        let mut b = ParamSet::from_pairs([("lr", 0.5)]);
        b.set("note", "x", true, false);

        let c = &a + &b;
        assert_eq!(c.get("lr"), Some(&ParamValue::Float(0.5)));
        assert_eq!(c.get("seed"), Some(&ParamValue::Float(1.0)));
        assert!(c.is_name_excluded("seed"));
        assert!(c.is_arg_excluded("note"));
        assert_eq!(c.len(), 3);
    }

    #[test]
    fn set_toggles_exclusions_back_on() {
        let mut p = ParamSet::new();
        p.set("k", 1, false, false);
        p.set("k", 2, true, true);
        assert!(!p.is_name_excluded("k"));
        assert!(!p.is_arg_excluded("k"));
    }

    #[test]
    fn dump_round_trip_coerces_numbers() {
        let mut p = sample();
        p.set("dir", ParamValue::Null, false, true);
        p.set("count", "42", true, false);

        let mut q = ParamSet::new();
        q.merge_dump(&p.to_dump()).unwrap();

        assert_eq!(q.get("seed"), Some(&ParamValue::Float(3.0)));
        assert_eq!(q.get("count"), Some(&ParamValue::Float(42.0)));
        assert_eq!(q.get("model"), Some(&ParamValue::Str("crf".into())));
        assert_eq!(q.get("dir"), Some(&ParamValue::Null));
        assert!(q.is_name_excluded("dir"));
        assert!(q.is_arg_excluded("count"));
        assert_eq!(q.display_name(), p.display_name());
    }

    #[test]
    fn malformed_dump_lines_are_rejected() {
        let mut p = ParamSet::new();
        assert!(p.merge_dump("only\ttwo\n").is_err());
    }
}
