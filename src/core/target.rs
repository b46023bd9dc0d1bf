//! Screen and logfile output targets

use super::error::OutputError;
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};
use std::str::FromStr;

/// One of the two output categories every level writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Screen,
    Logfile,
}

impl Target {
    pub const ALL: [Target; 2] = [Target::Screen, Target::Logfile];

    pub fn name(&self) -> &'static str {
        match self {
            Target::Screen => "screen",
            Target::Logfile => "logfile",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            Target::Screen => 0,
            Target::Logfile => 1,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A set of targets, used by setters and by formatter/stack trace masks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Targets(u8);

impl Targets {
    pub const NONE: Targets = Targets(0);
    pub const SCREEN: Targets = Targets(1);
    pub const LOGFILE: Targets = Targets(1 << 1);
    pub const BOTH: Targets = Targets(1 | 1 << 1);

    #[inline]
    pub fn contains(&self, target: Target) -> bool {
        self.0 & Targets::from(target).0 != 0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    /// Targets in this set, screen first.
    pub fn iter(&self) -> impl Iterator<Item = Target> + '_ {
        Target::ALL.into_iter().filter(move |t| self.contains(*t))
    }
}

impl From<Target> for Targets {
    fn from(target: Target) -> Self {
        match target {
            Target::Screen => Targets::SCREEN,
            Target::Logfile => Targets::LOGFILE,
        }
    }
}

impl FromStr for Targets {
    type Err = OutputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "screen" => Ok(Targets::SCREEN),
            "logfile" => Ok(Targets::LOGFILE),
            "both" => Ok(Targets::BOTH),
            "none" => Ok(Targets::NONE),
            _ => Err(OutputError::InvalidTarget(s.to_string())),
        }
    }
}

impl BitOr for Targets {
    type Output = Targets;

    fn bitor(self, rhs: Targets) -> Targets {
        Targets(self.0 | rhs.0)
    }
}

impl BitOrAssign for Targets {
    fn bitor_assign(&mut self, rhs: Targets) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Targets {
    type Output = Targets;

    fn bitand(self, rhs: Targets) -> Targets {
        Targets(self.0 & rhs.0)
    }
}
