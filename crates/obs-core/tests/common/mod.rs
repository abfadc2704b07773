#![allow(dead_code)]

use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;

use obs_core::{Endpoints, FetchError, Fetcher};

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../obs-parser/tests/data")
        .join(name)
}

pub fn fixture(name: &str) -> Vec<u8> {
    fs::read(fixture_path(name)).expect("failed to read fixture")
}

/// Answers each URL with the first route whose needle it contains.
#[derive(Default)]
pub struct StubFetcher {
    routes: Vec<(String, Result<Vec<u8>, u16>)>,
    pub requests: RefCell<Vec<String>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(mut self, needle: &str, body: impl Into<Vec<u8>>) -> Self {
        self.routes.push((needle.to_string(), Ok(body.into())));
        self
    }

    pub fn fail(mut self, needle: &str, status: u16) -> Self {
        self.routes.push((needle.to_string(), Err(status)));
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }
}

impl Fetcher for StubFetcher {
    fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.requests.borrow_mut().push(url.to_string());
        match self.routes.iter().find(|(needle, _)| url.contains(needle.as_str())) {
            Some((_, Ok(body))) => Ok(body.clone()),
            Some((_, Err(status))) => Err(FetchError::Status { status: *status }),
            None => Err(FetchError::Status { status: 404 }),
        }
    }
}

pub fn endpoints() -> Endpoints {
    Endpoints::default()
}
