//! Voice selection for speech playback
//!
//! Preference order: first voice whose name contains one of the preferred
//! substrings, then the first available voice, then none.

/// Pick a voice from `available` by case-insensitive name substring match
/// against `preferred`, in preference order.
pub fn select_voice<'a>(available: &'a [String], preferred: &[String]) -> Option<&'a str> {
    for wanted in preferred {
        let wanted = wanted.to_lowercase();
        if let Some(voice) = available
            .iter()
            .find(|name| name.to_lowercase().contains(&wanted))
        {
            return Some(voice);
        }
    }
    available.first().map(|s| s.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voices(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_preferred_substring_wins() {
        let available = voices(&["Samantha", "Ava (Premium)", "Daniel"]);
        let preferred = voices(&["premium", "enhanced"]);
        assert_eq!(select_voice(&available, &preferred), Some("Ava (Premium)"));
    }

    #[test]
    fn test_preference_order_matters() {
        let available = voices(&["Zoe (Enhanced)", "Ava (Premium)"]);
        let preferred = voices(&["premium", "enhanced"]);
        assert_eq!(select_voice(&available, &preferred), Some("Ava (Premium)"));
    }

    #[test]
    fn test_falls_back_to_first_available() {
        let available = voices(&["Samantha", "Daniel"]);
        let preferred = voices(&["premium"]);
        assert_eq!(select_voice(&available, &preferred), Some("Samantha"));
    }

    #[test]
    fn test_no_voices_yields_none() {
        assert_eq!(select_voice(&[], &voices(&["premium"])), None);
    }
}
