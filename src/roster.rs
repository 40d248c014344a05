use gloo_net::http::Request;
use log::{info, warn};
use std::collections::HashSet;
use thiserror::Error;

const DEFAULT_NAMES: [&str; 15] = [
    "Sam", "Luke", "Zee-Jay", "Courtney", "Banele", "Dumi", "Ethan", "Jazlyn", "Justine",
    "Lesedi", "Madi", "Martin", "Ndilisa", "Tino", "Wilmar",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RosterError {
    #[error("roster does not contain any names")]
    Empty,
    #[error("roster entry {0} is blank")]
    BlankEntry(usize),
    #[error("roster lists '{0}' more than once")]
    Duplicate(String),
}

#[derive(Debug, Error)]
pub enum DataError {
    #[error("network error: {0}")]
    Network(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error(transparent)]
    Roster(#[from] RosterError),
}

impl DataError {
    fn network<E: std::fmt::Display>(err: E) -> Self {
        Self::Network(err.to_string())
    }

    fn parse<E: std::fmt::Display>(err: E) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Ordered set of participant display names. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    names: Vec<String>,
}

impl Default for Roster {
    fn default() -> Self {
        Self {
            names: DEFAULT_NAMES.iter().map(|name| (*name).to_owned()).collect(),
        }
    }
}

impl Roster {
    pub fn from_names<I, S>(names: I) -> Result<Self, RosterError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut validated = Vec::new();

        for (index, raw) in names.into_iter().enumerate() {
            let trimmed = raw.as_ref().trim();
            if trimmed.is_empty() {
                return Err(RosterError::BlankEntry(index));
            }
            if !seen.insert(match_key(trimmed)) {
                return Err(RosterError::Duplicate(trimmed.to_owned()));
            }
            validated.push(trimmed.to_owned());
        }

        if validated.is_empty() {
            return Err(RosterError::Empty);
        }

        Ok(Self { names: validated })
    }

    /// Returns the canonically-cased roster entry matching `raw`, ignoring
    /// case and surrounding whitespace.
    pub fn lookup(&self, raw: &str) -> Option<&str> {
        let key = match_key(raw.trim());
        if key.is_empty() {
            return None;
        }
        self.names
            .iter()
            .find(|name| match_key(name) == key)
            .map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

fn match_key(name: &str) -> String {
    name.to_lowercase()
}

/// Loads the roster asset, falling back to the built-in names when the asset
/// is missing or invalid.
pub async fn fetch_roster(url: &str) -> Roster {
    match request_roster(url).await {
        Ok(roster) => {
            info!("Loaded roster of {} names from {}", roster.len(), url);
            roster
        }
        Err(err) => {
            warn!("Using built-in roster: {}", err);
            Roster::default()
        }
    }
}

async fn request_roster(url: &str) -> Result<Roster, DataError> {
    let response = Request::get(url)
        .send()
        .await
        .map_err(DataError::network)?;

    if !response.ok() {
        return Err(DataError::Network(format!(
            "HTTP {} while fetching {}",
            response.status(),
            url
        )));
    }

    let text = response.text().await.map_err(DataError::network)?;
    parse_roster(&text)
}

fn parse_roster(text: &str) -> Result<Roster, DataError> {
    let names: Vec<String> = serde_json::from_str(text).map_err(DataError::parse)?;
    Ok(Roster::from_names(names)?)
}
