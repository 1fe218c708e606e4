//! Folder special-use classification

use crate::models::SpecialUse;

/// Ordered name keywords, checked first. Substring match, case-insensitive.
const NAME_RULES: &[(&str, SpecialUse)] = &[
    ("inbox", SpecialUse::Inbox),
    ("sent", SpecialUse::Sent),
    ("draft", SpecialUse::Drafts),
    ("spam", SpecialUse::Spam),
    ("junk", SpecialUse::Spam),
    ("trash", SpecialUse::Trash),
    ("bin", SpecialUse::Trash),
    ("important", SpecialUse::Important),
    ("starred", SpecialUse::Starred),
    ("all mail", SpecialUse::Archive),
];

/// Ordered protocol flag matches, used when no name keyword applies
const FLAG_RULES: &[(&str, SpecialUse)] = &[
    ("\\Inbox", SpecialUse::Inbox),
    ("\\Sent", SpecialUse::Sent),
    ("\\Drafts", SpecialUse::Drafts),
    ("\\Junk", SpecialUse::Spam),
    ("\\Spam", SpecialUse::Spam),
    ("\\Trash", SpecialUse::Trash),
    ("\\Important", SpecialUse::Important),
    ("\\Flagged", SpecialUse::Starred),
    ("\\All", SpecialUse::Archive),
    ("\\Archive", SpecialUse::Archive),
];

/// Map a folder name and its protocol flags to a special-use tag.
///
/// Pure and total: unmatched folders are `Custom`.
pub fn classify(name: &str, flags: &[String]) -> SpecialUse {
    let lower = name.to_lowercase();
    for (keyword, tag) in NAME_RULES {
        if lower.contains(keyword) {
            return *tag;
        }
    }
    for (flag, tag) in FLAG_RULES {
        if flags.iter().any(|f| f.eq_ignore_ascii_case(flag)) {
            return *tag;
        }
    }
    SpecialUse::Custom
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_name_match() {
        assert_eq!(classify("INBOX", &[]), SpecialUse::Inbox);
        assert_eq!(classify("[Gmail]/Sent Mail", &[]), SpecialUse::Sent);
        assert_eq!(classify("Drafts", &[]), SpecialUse::Drafts);
        assert_eq!(classify("Junk E-mail", &[]), SpecialUse::Spam);
        assert_eq!(classify("Deleted Items Bin", &[]), SpecialUse::Trash);
        assert_eq!(classify("[Gmail]/All Mail", &[]), SpecialUse::Archive);
    }

    #[test]
    fn test_name_beats_flags() {
        // Name keywords take precedence over protocol flags
        assert_eq!(
            classify("Sent Items", &flags(&["\\Junk"])),
            SpecialUse::Sent
        );
    }

    #[test]
    fn test_flag_fallback() {
        assert_eq!(
            classify("Posta indesiderata", &flags(&["\\Junk"])),
            SpecialUse::Spam
        );
        assert_eq!(
            classify("Gelöschte Elemente", &flags(&["\\Trash"])),
            SpecialUse::Trash
        );
        assert_eq!(
            classify("Wichtig", &flags(&["\\Important"])),
            SpecialUse::Important
        );
    }

    #[test]
    fn test_flag_case_insensitive() {
        assert_eq!(classify("Skräppost", &flags(&["\\junk"])), SpecialUse::Spam);
    }

    #[test]
    fn test_unmatched_is_custom() {
        assert_eq!(classify("Receipts/2024", &[]), SpecialUse::Custom);
        assert_eq!(
            classify("Projects", &flags(&["\\HasNoChildren"])),
            SpecialUse::Custom
        );
    }
}
