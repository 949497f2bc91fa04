use anyhow::Result;

use crate::config::{Config, Credentials};
use crate::error::ProviderError;

/// `(source, provider, credential check)` for every syncable source.
fn source_rows(config: &Config, credentials: &Credentials) -> Vec<(&'static str, String, Result<(), ProviderError>)> {
    let p = &config.providers;
    vec![
        ("books", p.google_books.base_url.clone(), credentials.google_books_key().map(|_| ())),
        ("games", p.igdb.base_url.clone(), credentials.igdb().map(|_| ())),
        ("movies", p.tmdb.base_url.clone(), credentials.tmdb_key().map(|_| ())),
        ("tv", p.tmdb.base_url.clone(), credentials.tmdb_key().map(|_| ())),
        ("trailers", p.youtube.base_url.clone(), credentials.youtube_key().map(|_| ())),
    ]
}

/// Print each source with whether its credentials are present.
pub fn list_sources(config: &Config) -> Result<()> {
    let credentials = Credentials::from_env(&config.providers);

    println!("{:<10} {:<40} {:<8} STATUS", "SOURCE", "ENDPOINT", "HEALTHY");
    for (source, endpoint, check) in source_rows(config, &credentials) {
        let (healthy, status) = match check {
            Ok(()) => (true, "OK".to_string()),
            Err(e) => (false, format!("NOT CONFIGURED ({})", e)),
        };
        println!("{:<10} {:<40} {:<8} {}", source, endpoint, healthy, status);
    }

    Ok(())
}
