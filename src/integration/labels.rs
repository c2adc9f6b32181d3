//! Class names for console output.

use std::fs;
use std::io;
use std::path::Path;

use crate::tracker::Detection;

/// Class names indexed by `obj_id`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassNames {
    names: Vec<String>,
}

impl ClassNames {
    /// Read one name per line; blank trailing lines are ignored.
    pub fn load(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self::parse(&fs::read_to_string(path)?))
    }

    pub fn parse(text: &str) -> Self {
        let mut names: Vec<String> = text
            .lines()
            .map(|line| line.trim_end_matches('\r').to_string())
            .collect();

        while names.last().is_some_and(|n| n.trim().is_empty()) {
            names.pop();
        }

        Self { names }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, obj_id: u32) -> Option<&str> {
        self.names.get(obj_id as usize).map(String::as_str)
    }

    /// One line summary of a detection.
    pub fn describe(&self, det: &Detection) -> String {
        let label = match self.name(det.obj_id) {
            Some(name) => format!("{name} - "),
            None => String::new(),
        };

        format!(
            "{label}obj_id = {}, x = {}, y = {}, w = {}, h = {}, prob = {:.3}, track_id = {}",
            det.obj_id, det.x, det.y, det.w, det.h, det.prob, det.track_id
        )
    }
}
