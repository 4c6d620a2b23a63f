// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Advisory permission policy: glob allow/deny lists and command prefixes.
//!
//! Nothing here sandboxes the provider CLI. The policy shapes the prompt
//! (instructions block) and classifies the post-execution change set.

use omc_core::PermissionsConfig;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Deny patterns prepended to every effective policy. Not overridable.
pub const SECURE_DENY_DEFAULTS: &[&str] = &[
    ".git/**",
    ".env*",
    "**/.env*",
    "**/secrets/**",
    "**/.ssh/**",
    "**/node_modules/.cache/**",
];

/// Glob match with `*` (non-separator run), `**` (any run), `?` (single
/// non-separator). Everything else is literal; dots and brackets carry no
/// meaning. Iterative greedy-consume with backtracking to the last star,
/// so pathological patterns cannot go exponential.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pat: Vec<char> = pattern.chars().collect();
    let txt: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0usize, 0usize);
    // Fallback point: (pattern index after the star, text index it was
    // anchored at, whether it was a globstar).
    let mut star: Option<(usize, usize, bool)> = None;

    while t < txt.len() {
        if p < pat.len() {
            match pat[p] {
                '*' => {
                    let glob = p + 1 < pat.len() && pat[p + 1] == '*';
                    let after = if glob { p + 2 } else { p + 1 };
                    star = Some((after, t, glob));
                    p = after;
                    continue;
                }
                '?' if txt[t] != '/' => {
                    p += 1;
                    t += 1;
                    continue;
                }
                c if c == txt[t] => {
                    p += 1;
                    t += 1;
                    continue;
                }
                _ => {}
            }
        }
        match star {
            // Grow the star's consumed run by one character and retry.
            // A single `*` may not consume a separator.
            Some((after, anchor, glob)) if glob || txt[anchor] != '/' => {
                star = Some((after, anchor + 1, glob));
                p = after;
                t = anchor + 1;
            }
            _ => return false,
        }
    }

    // Trailing stars (and a bare `/**` suffix) match the empty remainder.
    while p < pat.len() {
        if pat[p] == '*' {
            p += 1;
        } else if pat[p] == '/' && pat.len() - p == 3 && pat[p + 1] == '*' && pat[p + 2] == '*' {
            p += 3;
        } else {
            break;
        }
    }
    p == pat.len()
}

/// Why a path failed the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathDecision {
    Allowed,
    /// The path escapes the working directory.
    Escapes,
    /// Matched a deny glob.
    DeniedBy(String),
    /// An allow list is configured and nothing matched.
    NotAllowed,
}

/// One classified violation, as recorded into task metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionViolation {
    pub path: String,
    pub reason: String,
}

/// A worker's policy with the secure deny-defaults folded in.
#[derive(Debug, Clone)]
pub struct EffectivePermissions {
    allowed_paths: Vec<String>,
    denied_paths: Vec<String>,
    allowed_commands: Vec<String>,
    max_file_size: Option<u64>,
    restrictive: bool,
}

impl EffectivePermissions {
    /// Fold the deny-defaults into a worker's configured policy.
    pub fn from_config(config: Option<&PermissionsConfig>) -> Self {
        let mut denied_paths: Vec<String> =
            SECURE_DENY_DEFAULTS.iter().map(|s| s.to_string()).collect();
        let (allowed_paths, allowed_commands, max_file_size, restrictive) = match config {
            Some(config) => {
                denied_paths.extend(config.denied_paths.iter().cloned());
                (
                    config.allowed_paths.clone(),
                    config.allowed_commands.clone(),
                    config.max_file_size,
                    config.is_restrictive(),
                )
            }
            None => (Vec::new(), Vec::new(), None, false),
        };
        Self {
            allowed_paths,
            denied_paths,
            allowed_commands,
            max_file_size,
            restrictive,
        }
    }

    pub fn max_file_size(&self) -> Option<u64> {
        self.max_file_size
    }

    /// Classify one path against the policy.
    ///
    /// Order: escape, then deny globs, then the allow list (an empty allow
    /// list allows everything).
    pub fn decide_path(&self, target: &str, cwd: &Path) -> PathDecision {
        let Some(rel) = normalize_relative(target, cwd) else {
            return PathDecision::Escapes;
        };
        let rel_str = rel.to_string_lossy();

        for pattern in &self.denied_paths {
            if glob_match(pattern, &rel_str) {
                return PathDecision::DeniedBy(pattern.clone());
            }
        }

        if self.allowed_paths.is_empty()
            || self.allowed_paths.iter().any(|p| glob_match(p, &rel_str))
        {
            PathDecision::Allowed
        } else {
            PathDecision::NotAllowed
        }
    }

    /// A command is allowed when no prefixes are configured, or when the
    /// trimmed command starts with one of them.
    pub fn is_command_allowed(&self, command: &str) -> bool {
        if self.allowed_commands.is_empty() {
            return true;
        }
        let trimmed = command.trim();
        self.allowed_commands
            .iter()
            .any(|prefix| trimmed.starts_with(prefix.as_str()))
    }

    fn has_any_restriction(&self) -> bool {
        self.restrictive
    }
}

/// Normalize `target` to a path relative to `cwd`; `None` when it escapes.
fn normalize_relative(target: &str, cwd: &Path) -> Option<PathBuf> {
    let path = Path::new(target);
    let candidate = if path.is_absolute() {
        path.strip_prefix(cwd).ok()?.to_path_buf()
    } else {
        path.to_path_buf()
    };

    let mut out = PathBuf::new();
    for component in candidate.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            Component::Normal(part) => out.push(part),
            // A rooted component after prefix-stripping means an absolute
            // path outside cwd.
            _ => return None,
        }
    }
    Some(out)
}

/// Classify each path, keeping the first failing reason per path.
pub fn find_permission_violations(
    paths: &[String],
    perms: &EffectivePermissions,
    cwd: &Path,
) -> Vec<PermissionViolation> {
    let mut violations = Vec::new();
    for path in paths {
        let reason = match perms.decide_path(path, cwd) {
            PathDecision::Allowed => continue,
            PathDecision::Escapes => "escapes the working directory".to_string(),
            PathDecision::DeniedBy(pattern) => format!("denied by pattern {:?}", pattern),
            PathDecision::NotAllowed => "not covered by allowedPaths".to_string(),
        };
        violations.push(PermissionViolation {
            path: path.clone(),
            reason,
        });
    }
    violations
}

/// Render the policy as a text block for prompt injection.
///
/// Advertises "No restrictions" only when nothing restrictive is set; an
/// explicit `maxFileSize` counts as a restriction.
pub fn format_permission_instructions(perms: &EffectivePermissions) -> String {
    if !perms.has_any_restriction() {
        return "No restrictions are configured for this worker.".to_string();
    }

    let mut out = String::new();
    if !perms.allowed_paths.is_empty() {
        out.push_str("You may only modify files matching:\n");
        for pattern in &perms.allowed_paths {
            out.push_str(&format!("  - {}\n", pattern));
        }
    }
    out.push_str("You must not touch files matching:\n");
    for pattern in &perms.denied_paths {
        out.push_str(&format!("  - {}\n", pattern));
    }
    if !perms.allowed_commands.is_empty() {
        out.push_str("You may only run commands starting with:\n");
        for prefix in &perms.allowed_commands {
            out.push_str(&format!("  - {}\n", prefix));
        }
    }
    if let Some(max) = perms.max_file_size {
        out.push_str(&format!("Created files must stay under {} bytes.\n", max));
    }
    out
}

#[cfg(test)]
#[path = "permissions_tests.rs"]
mod tests;
