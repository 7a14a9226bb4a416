//! Managed blocks inside the shared hosts file.
//!
//! `/etc/hosts` is shared with the user and with other projects, so this
//! engine only ever owns one marker-delimited block per project. The block
//! is appended, replaced as a whole when its hostnames grow, and later
//! removed exactly:
//!
//! ```text
//! <existing content>
//!
//! # BEGIN devstack - shop
//! 127.0.0.1 app.shop.local
//! 127.0.0.1 traefik.shop.local
//! # END devstack - shop
//! ```
//!
//! Every function here is a pure transformation of the file content, so the
//! read-modify-write logic is testable against in-memory strings.

use std::collections::HashSet;
use std::fmt::Write;

/// `# BEGIN <tool> - <project>`
#[must_use]
pub fn start_marker(tool: &str, project: &str) -> String {
    format!("# BEGIN {tool} - {project}")
}

/// `# END <tool> - <project>`
#[must_use]
pub fn end_marker(tool: &str, project: &str) -> String {
    format!("# END {tool} - {project}")
}

/// Hostname columns of every entry line, in file order.
fn entry_hostnames(content: &str) -> impl Iterator<Item = &str> {
    content
        .lines()
        .map(|line| line.split_once('#').map_or(line, |(entry, _)| entry))
        .flat_map(|entry| entry.split_whitespace().skip(1))
}

/// Every hostname mentioned in `content`, IP columns excluded, lowercased.
///
/// Blank lines, comment lines and trailing `#` comments are ignored.
#[must_use]
pub fn existing_hostnames(content: &str) -> HashSet<String> {
    entry_hostnames(content)
        .map(str::to_ascii_lowercase)
        .collect()
}

/// The subset of `required` not yet present anywhere in `content`,
/// in the order given. Hostnames compare case-insensitively.
#[must_use]
pub fn missing_hostnames(content: &str, required: &[String]) -> Vec<String> {
    let existing = existing_hostnames(content);
    required
        .iter()
        .filter(|host| !existing.contains(&host.to_ascii_lowercase()))
        .cloned()
        .collect()
}

/// Hostnames listed inside the project's block, in block order.
///
/// Empty when the project has no complete block.
#[must_use]
pub fn block_hostnames(content: &str, tool: &str, project: &str) -> Vec<String> {
    let Some((from, to)) = block_range(content, tool, project) else {
        return Vec::new();
    };
    let mut names: Vec<String> = Vec::new();
    for host in entry_hostnames(&content[from..to]) {
        if !names.iter().any(|n| n.eq_ignore_ascii_case(host)) {
            names.push(host.to_string());
        }
    }
    names
}

/// Renders a managed block mapping each hostname to `ip`.
#[must_use]
pub fn render_block(tool: &str, project: &str, ip: &str, hostnames: &[String]) -> String {
    let mut block = start_marker(tool, project);
    block.push('\n');
    for host in hostnames {
        let _ = writeln!(block, "{ip} {host}");
    }
    block.push_str(&end_marker(tool, project));
    block.push('\n');
    block
}

/// Bytes appended to the hosts file for `block`: a separating newline
/// followed by the block itself.
#[must_use]
pub fn append_payload(block: &str) -> String {
    format!("\n{block}")
}

/// `content` with `block` appended, as the append step writes it.
#[must_use]
pub fn append_block(content: &str, block: &str) -> String {
    let mut out = String::with_capacity(content.len() + block.len() + 1);
    out.push_str(content);
    out.push_str(&append_payload(block));
    out
}

/// Byte range of the project's block, including the newline that
/// [`append_payload`] put in front of it when that newline is still a
/// separator of its own.
fn block_range(content: &str, tool: &str, project: &str) -> Option<(usize, usize)> {
    let start = start_marker(tool, project);
    let end = end_marker(tool, project);

    let mut offset = 0;
    let mut begin = None;
    for line in content.split_inclusive('\n') {
        let text = line.trim_end_matches(['\n', '\r']);
        match begin {
            None if text == start => begin = Some(offset),
            Some(b) if text == end => {
                let to = offset + line.len();
                let from = if owns_separator(content.as_bytes(), b, to) { b - 1 } else { b };
                return Some((from, to));
            }
            _ => {}
        }
        offset += line.len();
    }

    if begin.is_some() {
        tracing::warn!(
            project = %project,
            "Hosts file has a start marker without a matching end marker, leaving it alone"
        );
    }
    None
}

/// Whether the newline just before a block spanning `begin..end` is the
/// separator written by [`append_payload`].
///
/// It is only when it forms an empty line of its own, or when the block is
/// the last thing in the file (the original content had no trailing
/// newline). Otherwise it terminates a user line and must stay.
fn owns_separator(bytes: &[u8], begin: usize, end: usize) -> bool {
    match begin {
        0 => false,
        1 => bytes[0] == b'\n',
        _ => bytes[begin - 1] == b'\n' && (bytes[begin - 2] == b'\n' || end == bytes.len()),
    }
}

/// Whether `content` holds a complete block for `project`.
#[must_use]
pub fn has_block(content: &str, tool: &str, project: &str) -> bool {
    block_range(content, tool, project).is_some()
}

/// `content` without the project's block, or `None` if there is no
/// complete marker pair.
///
/// Everything outside the block, other projects' blocks included, is kept
/// byte for byte, so `remove_block(append_block(c, b))` yields `c`.
#[must_use]
pub fn remove_block(content: &str, tool: &str, project: &str) -> Option<String> {
    let (from, to) = block_range(content, tool, project)?;
    let mut out = String::with_capacity(content.len() - (to - from));
    out.push_str(&content[..from]);
    out.push_str(&content[to..]);
    Some(out)
}

/// Projects owning a complete block for `tool`, in file order.
#[must_use]
pub fn managed_projects(content: &str, tool: &str) -> Vec<String> {
    let prefix = format!("# BEGIN {tool} - ");
    let mut projects: Vec<String> = Vec::new();
    for line in content.lines() {
        if let Some(project) = line.trim_end().strip_prefix(&prefix) {
            if has_block(content, tool, project) && !projects.iter().any(|p| p == project) {
                projects.push(project.to_string());
            }
        }
    }
    projects
}
