//! Compiler configurations
//!
//! A configuration is the rendered flag sequence handed to one compiler
//! invocation. Equality and hashing go through the rendered tokens, so two
//! configurations built differently but rendering the same flags are equal.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered flag sequence for one compiler invocation
///
/// # Example
/// ```
/// use compfl::configuration::Configuration;
///
/// let fail = Configuration::from_descriptor("-O2+-c");
/// let flipped = fail.with_switch("-fno-tree-vrp");
/// assert_eq!(flipped.to_string(), "-O2 -c -fno-tree-vrp");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Configuration {
    flags: Vec<String>,
}

impl Configuration {
    /// Build from whitespace-separated flags
    pub fn parse(text: &str) -> Self {
        Self {
            flags: text.split_whitespace().map(str::to_string).collect(),
        }
    }

    /// Build from a corpus descriptor, where `+` stands in for spaces
    pub fn from_descriptor(descriptor: &str) -> Self {
        Self::parse(&descriptor.replace('+', " "))
    }

    pub fn flags(&self) -> &[String] {
        &self.flags
    }

    /// Append one switch
    pub fn with_switch(&self, switch: &str) -> Self {
        let mut flags = self.flags.clone();
        flags.push(switch.to_string());
        Self { flags }
    }

    /// Append several switches in the given order
    pub fn with_switches<I, S>(&self, switches: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut flags = self.flags.clone();
        flags.extend(switches.into_iter().map(|s| s.as_ref().to_string()));
        Self { flags }
    }

    /// Append an LLVM pass-count cutoff (`-mllvm -opt-bisect-limit=N`)
    ///
    /// A negative limit disables the cutoff and makes the compiler report
    /// every pass it runs.
    pub fn with_cutoff(&self, limit: i64) -> Self {
        self.with_switches(["-mllvm".to_string(), format!("-opt-bisect-limit={limit}")])
    }

    /// Indices of the `-f` style switches, the ones an audit may flip
    pub fn switch_positions(&self) -> Vec<usize> {
        self.flags
            .iter()
            .enumerate()
            .filter(|(_, flag)| flag.starts_with("-f"))
            .map(|(i, _)| i)
            .collect()
    }

    /// Copy with the switches at `positions` flipped to their opposite
    pub fn with_flipped(&self, positions: &[usize]) -> Self {
        let mut flags = self.flags.clone();
        for &pos in positions {
            if let Some(flag) = flags.get_mut(pos) {
                *flag = flip_switch(flag);
            }
        }
        Self { flags }
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.flags.join(" "))
    }
}

/// Flip a `-fX` switch to `-fno-X` and back; other flags are returned as-is
pub fn flip_switch(switch: &str) -> String {
    if let Some(name) = switch.strip_prefix("-fno-") {
        format!("-f{name}")
    } else if let Some(name) = switch.strip_prefix("-f") {
        format!("-fno-{name}")
    } else {
        switch.to_string()
    }
}
