//! Static denylist: regex categories a mutation's textual form must clear
//! before it is ever executed.

use regex::RegexSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenylistCategory {
    FilesystemAccess,
    ProcessSpawn,
    NetworkAccess,
    DynamicEval,
    ProcessTermination,
    PrototypePollution,
}

impl std::fmt::Display for DenylistCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DenylistCategory::FilesystemAccess => "FILESYSTEM_ACCESS",
            DenylistCategory::ProcessSpawn => "PROCESS_SPAWN",
            DenylistCategory::NetworkAccess => "NETWORK_ACCESS",
            DenylistCategory::DynamicEval => "DYNAMIC_EVAL",
            DenylistCategory::ProcessTermination => "PROCESS_TERMINATION",
            DenylistCategory::PrototypePollution => "PROTOTYPE_POLLUTION",
        };
        write!(f, "{s}")
    }
}

/// One pattern per entry; `CATEGORIES[i]` names `PATTERNS[i]`'s category.
/// `RegexSet` checks all patterns in a single pass, then the first matching
/// index is mapped back to its category for the rejection reason.
struct DenylistEntry {
    category: DenylistCategory,
}

pub struct Denylist {
    set: RegexSet,
    entries: Vec<DenylistEntry>,
}

impl Denylist {
    pub fn new() -> Self {
        let patterns: Vec<(&str, DenylistCategory)> = vec![
            (r"\bstd::fs::", DenylistCategory::FilesystemAccess),
            (r"\bFile::(open|create)\b", DenylistCategory::FilesystemAccess),
            (r"\bopen\s*\(", DenylistCategory::FilesystemAccess),
            (r"\bunlink\s*\(", DenylistCategory::FilesystemAccess),
            (r"\bCommand::new\b", DenylistCategory::ProcessSpawn),
            (r"\bstd::process::", DenylistCategory::ProcessSpawn),
            (r"\bfork\s*\(", DenylistCategory::ProcessSpawn),
            (r"\bexec[lv]?p?\s*\(", DenylistCategory::ProcessSpawn),
            (r"\bTcpStream::connect\b", DenylistCategory::NetworkAccess),
            (r"\bTcpListener::bind\b", DenylistCategory::NetworkAccess),
            (r"\bUdpSocket::bind\b", DenylistCategory::NetworkAccess),
            (r"\bfetch\s*\(", DenylistCategory::NetworkAccess),
            (r"\beval\s*\(", DenylistCategory::DynamicEval),
            (r"\bFunction\s*\(", DenylistCategory::DynamicEval),
            (r"\bnew\s+Function\b", DenylistCategory::DynamicEval),
            (r"\bexit\s*\(", DenylistCategory::ProcessTermination),
            (r"\babort\s*\(", DenylistCategory::ProcessTermination),
            (r"\bprocess::abort\b", DenylistCategory::ProcessTermination),
            (r"__proto__", DenylistCategory::PrototypePollution),
            (r"\bconstructor\.prototype\b", DenylistCategory::PrototypePollution),
            (r"\bObject\.setPrototypeOf\b", DenylistCategory::PrototypePollution),
        ];

        let entries = patterns
            .iter()
            .map(|(_, category)| DenylistEntry {
                category: *category,
            })
            .collect();
        let set = RegexSet::new(patterns.iter().map(|(p, _)| *p))
            .expect("all denylist patterns are valid regexes");

        Self { set, entries }
    }

    /// Returns the category of the first denylist hit, if any.
    pub fn first_match(&self, text: &str) -> Option<DenylistCategory> {
        self.set
            .matches(text)
            .iter()
            .next()
            .map(|idx| self.entries[idx].category)
    }
}

impl Default for Denylist {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_filesystem_access() {
        let d = Denylist::new();
        assert_eq!(
            d.first_match("std::fs::remove_file(\"/etc/passwd\")"),
            Some(DenylistCategory::FilesystemAccess)
        );
    }

    #[test]
    fn flags_process_spawn() {
        let d = Denylist::new();
        assert_eq!(
            d.first_match("Command::new(\"rm\").arg(\"-rf\")"),
            Some(DenylistCategory::ProcessSpawn)
        );
    }

    #[test]
    fn allows_benign_payload() {
        let d = Denylist::new();
        assert_eq!(d.first_match("return 42"), None);
    }

    #[test]
    fn flags_prototype_pollution() {
        let d = Denylist::new();
        assert_eq!(
            d.first_match("x.__proto__.polluted = true"),
            Some(DenylistCategory::PrototypePollution)
        );
    }
}
