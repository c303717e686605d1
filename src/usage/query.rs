//! Composable VM filter.

use crate::repo::VmRecord;

use regex::{Regex, RegexBuilder};
use std::fmt;

/// Case-insensitive text matcher.
#[derive(Clone)]
enum Matcher {
    /// Lowercased substring
    Contains(String),
    Pattern(Regex),
}

impl Matcher {
    fn contains(s: &str) -> Self {
        Matcher::Contains(s.to_lowercase())
    }

    /// Recompile `pattern` case-insensitively. A pattern that cannot be
    /// recompiled is used as given.
    fn pattern(pattern: &Regex) -> Self {
        let re = RegexBuilder::new(pattern.as_str())
            .case_insensitive(true)
            .build()
            .unwrap_or_else(|_| pattern.clone());
        Matcher::Pattern(re)
    }

    fn is_match(&self, text: &str) -> bool {
        match self {
            Matcher::Contains(s) => text.to_lowercase().contains(s.as_str()),
            Matcher::Pattern(re) => re.is_match(text),
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Contains(s) => write!(f, "contains({:?})", s),
            Matcher::Pattern(re) => write!(f, "matches({:?})", re.as_str()),
        }
    }
}

/// An immutable VM predicate over name, guest OS and power state.
///
/// Starts out matching every VM in both power states; each modifier narrows
/// it and modifiers combine with logical AND.
///
/// ```
/// use vcdusage::VmQuery;
///
/// let windows_on = VmQuery::all().guest_os_containing("windows").powered_on();
/// ```
#[derive(Debug, Clone, Default)]
pub struct VmQuery {
    name: Option<Matcher>,
    guest_os: Option<Matcher>,
    powered_on: bool,
}

impl VmQuery {
    /// Match every VM, powered on or not.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn name_containing(mut self, s: &str) -> Self {
        self.name = Some(Matcher::contains(s));
        self
    }

    /// Match names against `pattern`, case-insensitively.
    pub fn name_matching(mut self, pattern: &Regex) -> Self {
        self.name = Some(Matcher::pattern(pattern));
        self
    }

    pub fn guest_os_containing(mut self, s: &str) -> Self {
        self.guest_os = Some(Matcher::contains(s));
        self
    }

    /// Match guest OS labels against `pattern`, case-insensitively.
    pub fn guest_os_matching(mut self, pattern: &Regex) -> Self {
        self.guest_os = Some(Matcher::pattern(pattern));
        self
    }

    /// Only match powered-on VMs.
    pub fn powered_on(mut self) -> Self {
        self.powered_on = true;
        self
    }

    pub fn matches(&self, vm: &VmRecord) -> bool {
        if self.powered_on && !vm.is_powered_on() {
            return false;
        }
        if let Some(name) = &self.name {
            if !name.is_match(&vm.name) {
                return false;
            }
        }
        if let Some(guest_os) = &self.guest_os {
            if !guest_os.is_match(&vm.guest_os) {
                return false;
            }
        }
        true
    }
}
