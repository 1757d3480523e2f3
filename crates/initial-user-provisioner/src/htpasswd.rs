//! The htpasswd file format: one `username:hash` line per account.
//!
//! [`HtpasswdFile`] keeps the entries keyed by user name, so adding or removing a single account
//! never touches the lines of the others.

use std::{collections::BTreeMap, fmt, str::FromStr};

use snafu::{OptionExt as _, Snafu, ensure};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum Error {
    #[snafu(display("the hasher output does not contain an htpasswd line"))]
    EmptyOutput,

    #[snafu(display("line {line} is not of the form <user>:<hash>"))]
    MalformedLine { line: usize },
}

/// A single `username:hash` line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HtpasswdEntry {
    username: String,
    hash: String,
}

impl HtpasswdEntry {
    /// Extracts the entry from the stdout of `htpasswd -nbB`, which ends with an empty line.
    pub fn from_command_output(stdout: &str) -> Result<Self> {
        let line = stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .context(EmptyOutputSnafu)?;

        parse_line(line, 1)
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }
}

impl FromStr for HtpasswdEntry {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        parse_line(line.trim(), 1)
    }
}

impl fmt::Display for HtpasswdEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.username, self.hash)
    }
}

fn parse_line(line: &str, number: usize) -> Result<HtpasswdEntry> {
    let (username, hash) = line
        .split_once(':')
        .context(MalformedLineSnafu { line: number })?;
    ensure!(
        !username.is_empty() && !hash.is_empty(),
        MalformedLineSnafu { line: number }
    );

    Ok(HtpasswdEntry {
        username: username.to_owned(),
        hash: hash.to_owned(),
    })
}

/// The contents of an htpasswd file, ordered by user name.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct HtpasswdFile {
    entries: BTreeMap<String, HtpasswdEntry>,
}

impl HtpasswdFile {
    /// Parses a whole file, blank lines are skipped. A later line for the same user wins.
    pub fn parse(contents: &str) -> Result<Self> {
        contents
            .lines()
            .enumerate()
            .map(|(index, line)| (index + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty())
            .map(|(number, line)| parse_line(line, number))
            .collect()
    }

    /// Adds or replaces the entry of the user, returning the replaced one.
    pub fn insert(&mut self, entry: HtpasswdEntry) -> Option<HtpasswdEntry> {
        self.entries.insert(entry.username.clone(), entry)
    }

    pub fn remove(&mut self, username: &str) -> Option<HtpasswdEntry> {
        self.entries.remove(username)
    }

    pub fn get(&self, username: &str) -> Option<&HtpasswdEntry> {
        self.entries.get(username)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Renders the file with one newline terminated line per entry.
    pub fn render(&self) -> String {
        self.entries
            .values()
            .map(|entry| format!("{entry}\n"))
            .collect()
    }
}

impl FromIterator<HtpasswdEntry> for HtpasswdFile {
    fn from_iter<I: IntoIterator<Item = HtpasswdEntry>>(iter: I) -> Self {
        let mut file = Self::default();
        for entry in iter {
            file.insert(entry);
        }
        file
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("testuser:HASHEDVALUE", "testuser", "HASHEDVALUE")]
    #[case("che-user:$2y$05$abc/def\n\n", "che-user", "$2y$05$abc/def")]
    #[case("\n  admin:$apr1$x:y  \n", "admin", "$apr1$x:y")]
    fn entry_from_command_output(
        #[case] stdout: &str,
        #[case] username: &str,
        #[case] hash: &str,
    ) {
        let entry = HtpasswdEntry::from_command_output(stdout).expect("output must parse");

        assert_eq!(entry.username(), username);
        assert_eq!(entry.hash(), hash);
    }

    #[rstest]
    #[case("", Error::EmptyOutput)]
    #[case("\n \n", Error::EmptyOutput)]
    #[case("test-string", Error::MalformedLine { line: 1 })]
    #[case(":hash", Error::MalformedLine { line: 1 })]
    #[case("user:", Error::MalformedLine { line: 1 })]
    fn invalid_command_output(#[case] stdout: &str, #[case] expected: Error) {
        assert_eq!(HtpasswdEntry::from_command_output(stdout), Err(expected));
    }

    #[test]
    fn file_keeps_one_line_per_user() {
        let mut file =
            HtpasswdFile::parse("bob:hash-b\n\nalice:hash-a\n").expect("file must parse");
        assert_eq!(file.len(), 2);

        let previous = file.insert("bob:new-hash".parse().expect("entry must parse"));
        assert_eq!(previous.map(|entry| entry.hash().to_owned()).as_deref(), Some("hash-b"));

        assert_eq!(file.render(), "alice:hash-a\nbob:new-hash\n");

        file.remove("alice");
        assert_eq!(file.get("alice"), None);
        assert_eq!(file.render(), "bob:new-hash\n");
    }

    #[test]
    fn file_reports_the_malformed_line() {
        assert_eq!(
            HtpasswdFile::parse("alice:hash-a\n\nbroken\n"),
            Err(Error::MalformedLine { line: 3 })
        );
    }

    #[test]
    fn empty_file_renders_empty() {
        let file = HtpasswdFile::parse("").expect("empty file must parse");

        assert!(file.is_empty());
        assert_eq!(file.render(), "");
    }
}
