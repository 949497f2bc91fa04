//! Provider-independent field normalization.
//!
//! Every connector projects its payload into catalog records through these
//! helpers, so the same rule (summary truncation, date handling, rating
//! color) applies whatever the source.

use chrono::{Local, NaiveDate, TimeZone};

/// Date format used for every date column in the catalog.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Crew jobs kept for movies.
pub const MOVIE_CREW_JOBS: &[&str] = &["Director", "Screenplay", "Producer"];

/// Crew jobs kept for TV, in addition to `created_by` entries.
pub const TV_CREW_JOBS: &[&str] = &["Director", "Screenplay", "Producer", "Executive Producer"];

/// Job recorded for a TV show's `created_by` entries.
pub const CREATOR_JOB: &str = "Creator";

/// Cut a description down to its first two sentences.
///
/// Sentences are delimited by `". "`. When more than two existed, a closing
/// period is appended to what is kept. Empty input stays empty.
pub fn short_summary(text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        return String::new();
    }
    let sentences: Vec<&str> = text.split(". ").collect();
    let mut kept = sentences[..sentences.len().min(2)].join(". ");
    if sentences.len() > 2 && !kept.ends_with('.') {
        kept.push('.');
    }
    kept
}

/// [`short_summary`] for optional provider fields; empty results become `None`.
pub fn short_summary_opt(text: Option<&str>) -> Option<String> {
    text.map(short_summary).filter(|s| !s.is_empty())
}

/// Convert epoch seconds to a calendar date in the local timezone.
pub fn epoch_to_local_date(ts: i64) -> Option<NaiveDate> {
    Local
        .timestamp_opt(ts, 0)
        .earliest()
        .map(|dt| dt.date_naive())
}

/// Parse an ISO `YYYY-MM-DD` date. Empty and malformed input yield `None`.
pub fn parse_iso_date(raw: Option<&str>) -> Option<NaiveDate> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT).ok()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Rewrite an IGDB image URL to request the 1080p variant.
pub fn upgrade_igdb_image(url: &str) -> String {
    url.replace("t_thumb", "t_1080p")
}

/// IGDB genre labels carry their short form in parentheses:
/// `"Role-playing (RPG)"` becomes `"RPG"`.
pub fn clean_genre_label(name: &str) -> String {
    if let Some(open) = name.find('(') {
        if let Some(len) = name[open + 1..].find(')') {
            return name[open + 1..open + 1 + len].to_string();
        }
    }
    name.to_string()
}

/// IGDB ratings are on a 0-100 scale; the catalog stores 0-10 with one decimal.
pub fn scale_igdb_rating(total_rating: f64) -> f64 {
    round1(total_rating / 10.0)
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Color badge for a 0-10 rating.
pub fn rating_color(rating: Option<f64>) -> &'static str {
    match rating {
        None => "white",
        Some(r) if r >= 8.0 => "#15B000",
        Some(r) if r >= 5.0 => "#FCDA17",
        Some(r) if r > 1.0 => "#FF4949",
        Some(_) => "#B7485C",
    }
}

/// Prefix a TMDb image path with the image CDN base. Empty paths map to `None`.
pub fn tmdb_image(base: &str, path: Option<&str>) -> Option<String> {
    match path {
        Some(p) if !p.is_empty() => Some(format!("{}{}", base, p)),
        _ => None,
    }
}

pub fn is_allowed_job(job: &str, allowed: &[&str]) -> bool {
    allowed.contains(&job)
}

/// A TMDb video entry, reduced to what trailer selection needs.
#[derive(Debug, Clone, Copy)]
pub struct VideoCandidate<'a> {
    pub key: &'a str,
    pub name: &'a str,
    pub site: &'a str,
    pub kind: &'a str,
    pub official: bool,
    pub language: &'a str,
}

/// Pick the trailer to show for a title.
///
/// Only YouTube trailers in Russian or English qualify. An official trailer
/// replaces any earlier pick and a Russian official one ends the search; a
/// non-official trailer is taken only while nothing has been picked yet.
pub fn select_trailer<'a>(videos: &[VideoCandidate<'a>]) -> Option<(&'a str, &'a str)> {
    let mut picked: Option<(&str, &str)> = None;
    for video in videos {
        if video.site != "YouTube" || video.kind != "Trailer" {
            continue;
        }
        let lang_ok = video.language == "ru" || video.language == "en";
        if !lang_ok {
            continue;
        }
        if video.official {
            picked = Some((video.key, video.name));
            if video.language == "ru" {
                break;
            }
        } else if picked.is_none() {
            picked = Some((video.key, video.name));
        }
    }
    picked
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    fn segments(s: &str) -> usize {
        s.split(". ").count()
    }

    #[test]
    fn summary_keeps_two_sentences() {
        assert_eq!(
            short_summary("First one. Second one. Third one. Fourth."),
            "First one. Second one."
        );
    }

    #[test]
    fn summary_of_two_sentences_is_unchanged() {
        assert_eq!(short_summary("First one. Second one."), "First one. Second one.");
        assert_eq!(short_summary("Only one sentence"), "Only one sentence");
    }

    #[test]
    fn summary_empty_and_missing() {
        assert_eq!(short_summary(""), "");
        assert_eq!(short_summary("   "), "");
        assert_eq!(short_summary_opt(None), None);
        assert_eq!(short_summary_opt(Some("")), None);
    }

    #[test]
    fn summary_never_exceeds_two_segments() {
        let inputs = [
            "a. b. c. d. e. f",
            "x",
            "x. y",
            "Dr. Who meets Mr. Smith. Then more. And more.",
            ". . . .",
            "ends with period. two. three.",
        ];
        for input in inputs {
            let out = short_summary(input);
            assert!(segments(&out) <= 2, "{:?} -> {:?}", input, out);
        }
    }

    #[test]
    fn epoch_conversion_matches_reference_year() {
        // Mid-year timestamps cannot cross a year boundary in any timezone.
        for (ts, year) in [
            (0i64 + 182 * 86_400, 1970),
            (962_409_600, 2000), // 2000-07-01 UTC
            (1_688_169_600, 2023), // 2023-07-01 UTC
        ] {
            let date = epoch_to_local_date(ts).unwrap();
            let reference = chrono::DateTime::from_timestamp(ts, 0).unwrap().year();
            assert_eq!(date.year(), reference);
            assert_eq!(date.year(), year);
        }
    }

    #[test]
    fn epoch_out_of_range_is_none() {
        assert_eq!(epoch_to_local_date(i64::MAX), None);
    }

    #[test]
    fn iso_dates() {
        assert_eq!(
            parse_iso_date(Some("2019-05-24")),
            NaiveDate::from_ymd_opt(2019, 5, 24)
        );
        assert_eq!(parse_iso_date(Some("")), None);
        assert_eq!(parse_iso_date(Some("2019-13-40")), None);
        assert_eq!(parse_iso_date(Some("soon")), None);
        assert_eq!(parse_iso_date(None), None);
    }

    #[test]
    fn igdb_image_upgrade() {
        assert_eq!(
            upgrade_igdb_image("//images.igdb.com/igdb/image/upload/t_thumb/co1wyy.jpg"),
            "//images.igdb.com/igdb/image/upload/t_1080p/co1wyy.jpg"
        );
        assert_eq!(upgrade_igdb_image("https://x/t_cover_big/a.jpg"), "https://x/t_cover_big/a.jpg");
    }

    #[test]
    fn genre_label_prefers_parenthesized_short_form() {
        assert_eq!(clean_genre_label("Role-playing (RPG)"), "RPG");
        assert_eq!(clean_genre_label("Shooter"), "Shooter");
        assert_eq!(clean_genre_label("Broken (label"), "Broken (label");
    }

    #[test]
    fn rating_scale_and_color() {
        assert_eq!(scale_igdb_rating(87.456), 8.7);
        assert_eq!(rating_color(Some(8.7)), "#15B000");
        assert_eq!(rating_color(Some(8.0)), "#15B000");
        assert_eq!(rating_color(Some(5.0)), "#FCDA17");
        assert_eq!(rating_color(Some(4.9)), "#FF4949");
        assert_eq!(rating_color(Some(1.0)), "#B7485C");
        assert_eq!(rating_color(Some(0.0)), "#B7485C");
        assert_eq!(rating_color(None), "white");
    }

    #[test]
    fn tmdb_image_paths() {
        let base = "https://image.tmdb.org/t/p/original";
        assert_eq!(
            tmdb_image(base, Some("/abc.jpg")).as_deref(),
            Some("https://image.tmdb.org/t/p/original/abc.jpg")
        );
        assert_eq!(tmdb_image(base, Some("")), None);
        assert_eq!(tmdb_image(base, None), None);
    }

    fn video<'a>(key: &'a str, official: bool, language: &'a str) -> VideoCandidate<'a> {
        VideoCandidate {
            key,
            name: key,
            site: "YouTube",
            kind: "Trailer",
            official,
            language,
        }
    }

    #[test]
    fn trailer_prefers_official_and_russian() {
        let videos = [
            video("unofficial-en", false, "en"),
            video("official-en", true, "en"),
            video("official-ru", true, "ru"),
            video("official-en-late", true, "en"),
        ];
        assert_eq!(select_trailer(&videos).map(|t| t.0), Some("official-ru"));
    }

    #[test]
    fn trailer_falls_back_to_first_unofficial() {
        let videos = [
            video("de", true, "de"),
            video("first", false, "en"),
            video("second", false, "ru"),
        ];
        assert_eq!(select_trailer(&videos).map(|t| t.0), Some("first"));
    }

    #[test]
    fn trailer_ignores_other_sites_and_kinds() {
        let mut teaser = video("teaser", true, "en");
        teaser.kind = "Teaser";
        let mut vimeo = video("vimeo", true, "en");
        vimeo.site = "Vimeo";
        assert_eq!(select_trailer(&[teaser, vimeo]), None);
    }

    #[test]
    fn crew_allow_lists() {
        assert!(is_allowed_job("Director", MOVIE_CREW_JOBS));
        assert!(!is_allowed_job("Executive Producer", MOVIE_CREW_JOBS));
        assert!(is_allowed_job("Executive Producer", TV_CREW_JOBS));
        assert!(!is_allowed_job("Gaffer", TV_CREW_JOBS));
    }
}
