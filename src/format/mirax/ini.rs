//! Ordered INI document for `Slidedat.ini`.
//!
//! Slidedat files are UTF-8, usually with a BOM and CRLF line endings, and
//! some readers are picky about both. The document keeps group and entry
//! order, the BOM, the line ending, and any lines it does not understand, so
//! an edited file differs from the original only where it was edited.

const BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// One line inside a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IniLine {
    Entry(IniEntry),
    /// Blank lines, comments and anything else, kept verbatim
    Other(String),
}

/// A `KEY = VALUE` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IniEntry {
    pub key: String,
    pub value: String,
    /// Whether the `=` was surrounded by spaces
    spaced: bool,
}

/// A `[NAME]` group and its lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IniGroup {
    pub name: String,
    pub lines: Vec<IniLine>,
}

impl IniGroup {
    /// Entries in order, skipping non-entry lines.
    pub fn entries(&self) -> impl Iterator<Item = &IniEntry> {
        self.lines.iter().filter_map(|line| match line {
            IniLine::Entry(e) => Some(e),
            IniLine::Other(_) => None,
        })
    }

    fn entries_mut(&mut self) -> impl Iterator<Item = &mut IniEntry> {
        self.lines.iter_mut().filter_map(|line| match line {
            IniLine::Entry(e) => Some(e),
            IniLine::Other(_) => None,
        })
    }
}

/// A parsed INI file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IniDocument {
    bom: bool,
    line_ending: &'static str,
    /// Lines before the first group
    preamble: Vec<String>,
    groups: Vec<IniGroup>,
    trailing_newline: bool,
}

impl IniDocument {
    /// Parse raw file bytes. Invalid UTF-8 is replaced.
    pub fn parse(bytes: &[u8]) -> Self {
        let bom = bytes.starts_with(BOM);
        let body = if bom { &bytes[BOM.len()..] } else { bytes };
        let text = String::from_utf8_lossy(body);

        let line_ending = if text.contains("\r\n") { "\r\n" } else { "\n" };
        let trailing_newline = text.ends_with('\n');

        let mut preamble = Vec::new();
        let mut groups: Vec<IniGroup> = Vec::new();

        for raw in text.lines() {
            let trimmed = raw.trim();
            if trimmed.starts_with('[') && trimmed.ends_with(']') && trimmed.len() >= 2 {
                groups.push(IniGroup {
                    name: trimmed[1..trimmed.len() - 1].trim().to_string(),
                    lines: Vec::new(),
                });
                continue;
            }

            let line = match trimmed.split_once('=') {
                Some((key, value)) if !key.trim().is_empty() && !trimmed.starts_with(';') => {
                    IniLine::Entry(IniEntry {
                        key: key.trim().to_string(),
                        value: value.trim().to_string(),
                        spaced: key.ends_with(' ') || value.starts_with(' '),
                    })
                }
                _ => IniLine::Other(raw.to_string()),
            };

            match groups.last_mut() {
                Some(group) => group.lines.push(line),
                None => preamble.push(raw.to_string()),
            }
        }

        Self {
            bom,
            line_ending,
            preamble,
            groups,
            trailing_newline,
        }
    }

    /// Serialize back to bytes, with the original BOM and line ending.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut lines: Vec<String> = self.preamble.clone();
        for group in &self.groups {
            lines.push(format!("[{}]", group.name));
            for line in &group.lines {
                lines.push(match line {
                    IniLine::Entry(e) if e.spaced => format!("{} = {}", e.key, e.value),
                    IniLine::Entry(e) => format!("{}={}", e.key, e.value),
                    IniLine::Other(s) => s.clone(),
                });
            }
        }

        let mut text = lines.join(self.line_ending);
        if self.trailing_newline {
            text.push_str(self.line_ending);
        }

        let mut out = Vec::with_capacity(text.len() + BOM.len());
        if self.bom {
            out.extend_from_slice(BOM);
        }
        out.extend_from_slice(text.as_bytes());
        out
    }

    pub fn groups(&self) -> &[IniGroup] {
        &self.groups
    }

    pub fn group(&self, name: &str) -> Option<&IniGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    fn group_mut(&mut self, name: &str) -> Option<&mut IniGroup> {
        self.groups.iter_mut().find(|g| g.name == name)
    }

    /// Value of `key` in `group`.
    pub fn get(&self, group: &str, key: &str) -> Option<&str> {
        self.group(group)?
            .entries()
            .find(|e| e.key == key)
            .map(|e| e.value.as_str())
    }

    /// Replace the value of an existing entry. Returns false if absent.
    pub fn set(&mut self, group: &str, key: &str, value: &str) -> bool {
        let Some(entry) = self
            .group_mut(group)
            .and_then(|g| g.entries_mut().find(|e| e.key == key))
        else {
            return false;
        };
        entry.value = value.to_string();
        true
    }

    /// Remove every entry of `group` whose key satisfies `predicate`.
    pub fn remove_entries(&mut self, group: &str, predicate: impl Fn(&str) -> bool) -> usize {
        let Some(g) = self.group_mut(group) else {
            return 0;
        };
        let before = g.lines.len();
        g.lines
            .retain(|line| !matches!(line, IniLine::Entry(e) if predicate(&e.key)));
        before - g.lines.len()
    }

    /// Rename keys of `group` through `rename`, which returns the new name
    /// for keys that should change.
    pub fn rename_keys(&mut self, group: &str, rename: impl Fn(&str) -> Option<String>) -> usize {
        let Some(g) = self.group_mut(group) else {
            return 0;
        };
        let mut renamed = 0;
        for entry in g.entries_mut() {
            if let Some(new_key) = rename(&entry.key) {
                entry.key = new_key;
                renamed += 1;
            }
        }
        renamed
    }

    /// Remove a whole group. Returns false if it does not exist.
    pub fn remove_group(&mut self, name: &str) -> bool {
        let before = self.groups.len();
        self.groups.retain(|g| g.name != name);
        before != self.groups.len()
    }
}
