//! Save-name generation for stored uploads.

use chrono::{DateTime, Local};
use md5::{Digest, Md5};
use rand::Rng;
use uuid::Uuid;

use super::models::{extension_of, NamingStrategy};

/// Build the relative save name `<YYYYMMDD>/<basename>.<ext>` for a file
/// uploaded as `original_name`.
pub fn build_save_name(original_name: &str, strategy: &NamingStrategy) -> String {
    build_save_name_at(original_name, strategy, Local::now())
}

pub fn build_save_name_at(original_name: &str, strategy: &NamingStrategy, now: DateTime<Local>) -> String {
    let day = now.format("%Y%m%d");

    let basename = match strategy {
        NamingStrategy::Time => {
            let suffix: u16 = rand::thread_rng().gen_range(1000..=9999);
            format!("{}{}", now.format("%Y%m%d%H%M%S"), suffix)
        }
        NamingStrategy::Md5 => {
            let stamp = format!("{:.4}", now.timestamp_micros() as f64 / 1_000_000.0);
            hex::encode(Md5::digest(stamp.as_bytes()))
        }
        NamingStrategy::Uniqid => Uuid::new_v4().simple().to_string(),
        NamingStrategy::Explicit(name) => name.clone(),
    };

    if basename.contains('.') {
        format!("{}/{}", day, basename)
    } else {
        format!("{}/{}.{}", day, basename, extension_of(original_name))
    }
}

/// Whether `savename` has the `<YYYYMMDD>/<basename>` shape with a basename
/// that stays inside the day directory.
pub fn is_safe_save_name(savename: &str) -> bool {
    let Some((day, basename)) = savename.split_once('/') else {
        return false;
    };

    day.len() == 8
        && day.bytes().all(|b| b.is_ascii_digit())
        && !basename.is_empty()
        && !basename.starts_with('.')
        && !basename.contains(['/', '\\', ':', '\0'])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 1, 31, 15, 30, 12).unwrap()
    }

    #[test]
    fn test_time_strategy() {
        let name = build_save_name_at("photo.png", &NamingStrategy::Time, fixed_now());
        let (day, file) = name.split_once('/').unwrap();
        assert_eq!(day, "20240131");
        assert!(file.starts_with("20240131153012"));
        assert!(file.ends_with(".png"));

        let digits = &file["20240131153012".len()..file.len() - ".png".len()];
        assert_eq!(digits.len(), 4);
        let suffix: u16 = digits.parse().unwrap();
        assert!((1000..=9999).contains(&suffix));
    }

    #[test]
    fn test_md5_strategy() {
        for original in ["photo.jpg", "My Holiday Photo.jpeg", "scan.tar.gz"] {
            let name = build_save_name(original, &NamingStrategy::Md5);
            assert!(!name.chars().any(char::is_whitespace), "{}", name);

            let expected_ext = extension_of(original);
            assert!(name.ends_with(&format!(".{}", expected_ext)), "{}", name);

            let (_, file) = name.split_once('/').unwrap();
            let digest = file.split('.').next().unwrap();
            assert_eq!(digest.len(), 32);
            assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn test_uniqid_strategy_is_unique() {
        let first = build_save_name("a.gif", &NamingStrategy::Uniqid);
        let second = build_save_name("a.gif", &NamingStrategy::Uniqid);
        assert_ne!(first, second);
        assert!(first.ends_with(".gif"));
    }

    #[test]
    fn test_explicit_strategy() {
        let now = fixed_now();
        let strategy = NamingStrategy::Explicit("avatar".to_string());
        assert_eq!(build_save_name_at("me.PNG", &strategy, now), "20240131/avatar.PNG");

        let strategy = NamingStrategy::Explicit("avatar.webp".to_string());
        assert_eq!(build_save_name_at("me.png", &strategy, now), "20240131/avatar.webp");
    }

    #[test]
    fn test_safe_save_names() {
        let now = fixed_now();
        for strategy in [NamingStrategy::Time, NamingStrategy::Md5, NamingStrategy::Uniqid] {
            assert!(is_safe_save_name(&build_save_name_at("photo.png", &strategy, now)));
        }
        assert!(is_safe_save_name("20240131/avatar.png"));
        assert!(is_safe_save_name("20240131/a..b.png"));

        for name in ["../../escaped.txt", "a/b", "..\\evil", ".hidden", "C:evil", ""] {
            let strategy = NamingStrategy::Explicit(name.to_string());
            let savename = build_save_name_at("x.txt", &strategy, now);
            assert!(!is_safe_save_name(&savename), "{}", savename);
        }
        assert!(!is_safe_save_name("avatar.png"));
        assert!(!is_safe_save_name("2024013/avatar.png"));
    }

    #[test]
    fn test_original_without_extension() {
        let strategy = NamingStrategy::Explicit("blob".to_string());
        assert_eq!(build_save_name_at("README", &strategy, fixed_now()), "20240131/blob.");
    }
}
