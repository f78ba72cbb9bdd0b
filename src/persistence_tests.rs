// src/persistence_tests.rs

#[cfg(test)]
mod tests {
    use crate::models::{NewUser, PayrollSettings};
    use crate::persistence::*;
    use crate::settings::SettingsSlot;
    use crate::store::{HolidayStore, InMemoryStore, UserStore, WorkHoursStore};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use std::{
        env, fs,
        path::PathBuf,
    };

    fn get_test_path(test_name: &str) -> PathBuf {
        env::temp_dir().join(format!("hours_tracker_{}.json", test_name))
    }

    fn setup(test_name: &str) -> PathBuf {
        teardown(test_name); // Clean any previous test data first
        get_test_path(test_name)
    }

    fn teardown(test_name: &str) {
        let _ = fs::remove_file(get_test_path(test_name));
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_missing_file_starts_empty() {
        let path = setup("missing_file");
        let (store, settings) = load_data_file(&path).unwrap();
        assert_eq!(store.counts().unwrap(), (0, 0, 0));
        assert_eq!(settings.get().unwrap(), None);
        teardown("missing_file");
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let test_name = "round_trip";
        let path = setup(test_name);

        let store = InMemoryStore::new();
        let user = store
            .insert_user(NewUser {
                email: "emp@example.com".to_string(),
                is_employee: true,
                hourly_wage: dec!(12.34),
                ..Default::default()
            })
            .unwrap();
        store
            .upsert_work_hours(user.id, date("2025-02-03"), dec!(7.5), false)
            .unwrap();
        store
            .insert_holiday(date("2025-03-01"), "Independence Movement Day".to_string())
            .unwrap();
        let settings = SettingsSlot::new();
        settings.update_minimum_wage(dec!(10030)).unwrap();

        save_data_file(&path, &store, &settings).unwrap();
        assert!(!temp_path(&path).exists());
        let (loaded, loaded_settings) = load_data_file(&path).unwrap();

        assert_eq!(loaded.counts().unwrap(), (1, 1, 1));
        let loaded_user = loaded.get_user(user.id).unwrap().unwrap();
        assert_eq!(loaded_user, user);
        let rows = loaded.find_work_hours(user.id, None).unwrap();
        assert_eq!(rows[0].hours, dec!(7.5));
        assert_eq!(
            loaded_settings.get().unwrap(),
            Some(PayrollSettings {
                minimum_wage: dec!(10030)
            })
        );

        // Ids keep counting from where the saved store stopped
        let second = loaded
            .insert_user(NewUser {
                email: "second@example.com".to_string(),
                ..Default::default()
            })
            .unwrap();
        assert!(second.id > user.id);

        teardown(test_name);
    }

    #[test]
    fn test_save_replaces_previous_snapshot() {
        let test_name = "replace_snapshot";
        let path = setup(test_name);
        let store = InMemoryStore::new();
        let settings = SettingsSlot::new();
        save_data_file(&path, &store, &settings).unwrap();

        store
            .insert_user(NewUser {
                email: "late@example.com".to_string(),
                ..Default::default()
            })
            .unwrap();
        save_data_file(&path, &store, &settings).unwrap();

        let (loaded, _) = load_data_file(&path).unwrap();
        assert_eq!(loaded.counts().unwrap(), (1, 0, 0));
        assert!(!temp_path(&path).exists());
        teardown(test_name);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let test_name = "corrupt_file";
        let path = setup(test_name);
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            load_data_file(&path),
            Err(PersistenceError::Json(_))
        ));
        teardown(test_name);
    }
}
