use anyhow::{Context, Result};
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

/// Links that were already posted, kept in a flat text file (one link per line).
///
/// Only the most recent `capacity` links survive a `save`.
#[derive(Debug)]
pub struct SeenLinks {
    path: PathBuf,
    capacity: usize,
    order: VecDeque<String>,
    index: HashSet<String>,
}

impl SeenLinks {
    pub async fn load(path: impl AsRef<Path>, capacity: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut seen = Self {
            path,
            capacity,
            order: VecDeque::new(),
            index: HashSet::new(),
        };

        match tokio::fs::read_to_string(&seen.path).await {
            Ok(content) => {
                for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
                    seen.insert(line);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| format!("reading seen links from {}", seen.path.display()));
            }
        }

        Ok(seen)
    }

    pub fn contains(&self, link: &str) -> bool {
        self.index.contains(link)
    }

    /// Returns false when the link was already known.
    pub fn insert(&mut self, link: &str) -> bool {
        if !self.index.insert(link.to_owned()) {
            return false;
        }
        self.order.push_back(link.to_owned());
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub async fn save(&mut self) -> Result<()> {
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.index.remove(&oldest);
            }
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        let mut body = self.order.iter().cloned().collect::<Vec<_>>().join("\n");
        if !body.is_empty() {
            body.push('\n');
        }
        tokio::fs::write(&self.path, body)
            .await
            .with_context(|| format!("writing seen links to {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_loads_empty() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let seen = SeenLinks::load(dir.path().join("seen.txt"), 10).await?;
        assert!(seen.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn save_keeps_only_the_newest_lines() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("seen.txt");

        let mut seen = SeenLinks::load(&path, 3).await?;
        for n in 1..=5 {
            seen.insert(&format!("https://example.com/{n}"));
        }
        assert!(!seen.insert("https://example.com/5"), "duplicates are ignored");
        seen.save().await?;

        let content = tokio::fs::read_to_string(&path).await?;
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines,
            vec!["https://example.com/3", "https://example.com/4", "https://example.com/5"]
        );
        assert!(!seen.contains("https://example.com/1"));

        let reloaded = SeenLinks::load(&path, 3).await?;
        assert_eq!(reloaded.len(), 3);
        assert!(reloaded.contains("https://example.com/4"));
        Ok(())
    }
}
