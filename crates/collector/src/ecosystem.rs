use std::path::{Path, PathBuf};

use common::{AppError, Result};
use normalizer::RepoRef;
use serde::Deserialize;
use tracing::{info, warn};

const GITHUB_PREFIX: &str = "https://github.com/";

#[derive(Debug, Deserialize)]
struct EcosystemFile {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    github_organizations: Vec<String>,
    #[serde(default, rename = "repo")]
    repos: Vec<RepoEntry>,
}

#[derive(Debug, Deserialize)]
struct RepoEntry {
    url: String,
}

/// Organizations and standalone repositories listed for one chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ecosystem {
    pub chain: String,
    pub title: Option<String>,
    pub organizations: Vec<String>,
    pub repos: Vec<RepoRef>,
}

/// `{dir}/{first letter}/{chain}.toml`, falling back to `{dir}/{chain}.toml`.
pub fn candidate_paths(dir: &Path, chain: &str) -> Vec<PathBuf> {
    let file = format!("{chain}.toml");
    let mut paths = Vec::with_capacity(2);
    if let Some(first) = chain.chars().next() {
        paths.push(dir.join(first.to_lowercase().to_string()).join(&file));
    }
    paths.push(dir.join(file));
    paths
}

/// A missing, non-UTF-8 or unparseable file is a `Configuration` error.
/// Other read failures surface as `Io`.
pub async fn load_ecosystem(dir: &Path, chain: &str) -> Result<Ecosystem> {
    let candidates = candidate_paths(dir, chain);
    for path in &candidates {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => {
                let ecosystem = parse_ecosystem(chain, &content).map_err(|err| {
                    AppError::configuration(format!("{}: {err}", path.display()))
                })?;
                info!(
                    chain,
                    path = %path.display(),
                    organizations = ecosystem.organizations.len(),
                    repos = ecosystem.repos.len(),
                    "loaded ecosystem"
                );
                return Ok(ecosystem);
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
            Err(err) if err.kind() == std::io::ErrorKind::InvalidData => {
                return Err(AppError::configuration(format!(
                    "{}: not valid UTF-8",
                    path.display()
                )));
            }
            Err(err) => return Err(err.into()),
        }
    }
    let looked_in: Vec<String> = candidates
        .iter()
        .map(|path| path.display().to_string())
        .collect();
    Err(AppError::configuration(format!(
        "no ecosystem file for {chain} (looked in {})",
        looked_in.join(", ")
    )))
}

pub fn parse_ecosystem(
    chain: &str,
    content: &str,
) -> std::result::Result<Ecosystem, toml::de::Error> {
    let file: EcosystemFile = toml::from_str(content)?;
    let mut ecosystem = Ecosystem {
        chain: chain.to_string(),
        title: file.title,
        ..Ecosystem::default()
    };

    let urls = file
        .github_organizations
        .iter()
        .chain(file.repos.iter().map(|entry| &entry.url));
    for url in urls {
        let Some(path) = github_path(url) else {
            warn!(chain, url = %url, "skipping non-GitHub entry");
            continue;
        };
        match path.split_once('/') {
            None => {
                if !ecosystem.organizations.iter().any(|org| org.eq_ignore_ascii_case(path)) {
                    ecosystem.organizations.push(path.to_string());
                }
            }
            Some(_) => match RepoRef::from_full_name(path) {
                Some(repo) if !ecosystem.repos.contains(&repo) => ecosystem.repos.push(repo),
                Some(_) => {}
                None => warn!(chain, url = %url, "skipping malformed repository URL"),
            },
        }
    }
    Ok(ecosystem)
}

fn github_path(url: &str) -> Option<&str> {
    let path = url.trim().strip_prefix(GITHUB_PREFIX)?;
    let path = path.trim_end_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    (!path.is_empty()).then_some(path)
}
