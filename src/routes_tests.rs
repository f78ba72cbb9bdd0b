// src/routes_tests.rs

#[cfg(test)]
mod tests {
    use crate::models::{NewUser, User};
    use crate::persistence::{load_data_file, temp_path};
    use crate::routes::*;
    use crate::settings::SettingsSlot;
    use crate::store::{InMemoryStore, UserStore, WorkHoursStore};
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        Router,
    };
    use http_body_util::BodyExt;
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};
    use std::{env, fs};
    use tower::ServiceExt;

    const ROOT: &str = "root@example.com";
    const ADMIN: &str = "admin@example.com";
    const EMPLOYEE: &str = "emp@example.com";

    struct TestApp {
        router: Router,
        employee: User,
        admin: User,
    }

    fn create_test_store() -> (InMemoryStore, User, User) {
        let store = InMemoryStore::new();
        store
            .insert_user(NewUser {
                email: ROOT.to_string(),
                is_superuser: true,
                ..Default::default()
            })
            .unwrap();
        let admin = store
            .insert_user(NewUser {
                email: ADMIN.to_string(),
                is_admin: true,
                ..Default::default()
            })
            .unwrap();
        let employee = store
            .insert_user(NewUser {
                email: EMPLOYEE.to_string(),
                is_employee: true,
                hourly_wage: dec!(10),
                ..Default::default()
            })
            .unwrap();
        (store, employee, admin)
    }

    fn create_test_app() -> TestApp {
        let (store, employee, admin) = create_test_store();
        let state = AppState::new(store, SettingsSlot::new(), None);
        TestApp {
            router: build_router(state),
            employee,
            admin,
        }
    }

    fn get(uri: &str, caller: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(email) = caller {
            builder = builder.header(IDENTITY_HEADER, email);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn send_json(method: &str, uri: &str, caller: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(IDENTITY_HEADER, caller)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn call(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_status_needs_no_identity() {
        let app = create_test_app();
        let (status, body) = call(&app.router, get("/status", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["users"], 3);
    }

    #[tokio::test]
    async fn test_missing_or_unknown_identity_is_unauthorized() {
        let app = create_test_app();
        let (status, body) = call(&app.router, get("/api/calendar", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Authentication required.");

        let (status, _) = call(&app.router, get("/api/calendar", Some("ghost@example.com"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_employee_cannot_see_dashboard() {
        let app = create_test_app();
        let (status, body) = call(&app.router, get("/api/dashboard", Some(EMPLOYEE))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "You do not have permission to access this page.");
    }

    #[tokio::test]
    async fn test_bulk_entry_shows_up_in_calendar_and_dashboard() {
        let app = create_test_app();
        let (status, body) = call(
            &app.router,
            send_json(
                "POST",
                "/api/hours/bulk",
                ADMIN,
                json!({ "date": "2025-05-02", "hours": 8 }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["written"], 1);
        assert_eq!(body["results"][0]["email"], EMPLOYEE);

        let (status, body) = call(
            &app.router,
            get("/api/calendar?year=2025&month=5", Some(EMPLOYEE)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["month_name"], "May");
        assert_eq!(body["total_hours"], "8");
        assert_eq!(body["total_salary"], "80");
        assert_eq!(body["previous"], json!({ "year": 2025, "month": 4 }));

        let (status, body) = call(
            &app.router,
            get("/api/dashboard?year=2025&month=5", Some(ROOT)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["employees"].as_array().unwrap().len(), 1);
        assert_eq!(body["total_salary"], "80");
    }

    #[tokio::test]
    async fn test_bulk_entry_validation_errors() {
        let app = create_test_app();
        let (status, body) = call(
            &app.router,
            send_json("POST", "/api/hours/bulk", ADMIN, json!({ "date": "2025-05-02" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Please provide a valid number of hours.");

        let (status, body) = call(
            &app.router,
            send_json(
                "POST",
                "/api/hours/bulk",
                ADMIN,
                json!({ "date": "2025-05-02", "hours": "-4" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["written"], 0);
        assert_eq!(body["rejected"], 1);

        let (status, _) = call(
            &app.router,
            send_json(
                "POST",
                "/api/hours/bulk",
                EMPLOYEE,
                json!({ "date": "2025-05-02", "hours": 8 }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_individual_entry_and_day_roster() {
        let app = create_test_app();
        let entries = json!({
            "date": "2025-05-05",
            "entries": [{ "user_id": app.employee.id, "hours": "6.5" }]
        });
        let (status, body) = call(
            &app.router,
            send_json("POST", "/api/hours/individual", ADMIN, entries),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["written"], 1);

        let (status, body) = call(&app.router, get("/api/hours?date=2025-05-05", Some(ADMIN))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["entries"][0]["hours"], "6.5");

        let (status, body) = call(
            &app.router,
            send_json("POST", "/api/hours/bulk-absence", ADMIN, json!({ "date": "2025-05-05" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["results"][0]["entry"]["is_absence"], true);
    }

    #[tokio::test]
    async fn test_calendar_rejects_illegal_month() {
        let app = create_test_app();
        let (status, body) = call(
            &app.router,
            get("/api/calendar?year=2025&month=13", Some(EMPLOYEE)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad month number 13; must be 1-12");
    }

    #[tokio::test]
    async fn test_employee_calendar_for_non_employee_is_not_found() {
        let app = create_test_app();
        let uri = format!("/api/employees/{}/calendar", app.admin.id);
        let (status, _) = call(&app.router, get(&uri, Some(ROOT))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let uri = format!("/api/employees/{}/calendar?year=2025&month=1", app.employee.id);
        let (status, body) = call(&app.router, get(&uri, Some(ROOT))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["employee_email"], EMPLOYEE);
    }

    #[tokio::test]
    async fn test_dashboard_csv_download() {
        let app = create_test_app();
        let response = app
            .router
            .clone()
            .oneshot(get("/api/dashboard.csv", Some(ROOT)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/csv; charset=utf-8"
        );
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.lines().last().unwrap().starts_with("TOTAL"));
    }

    #[tokio::test]
    async fn test_minimum_wage_update() {
        let app = create_test_app();
        let (status, body) = call(
            &app.router,
            send_json("PUT", "/api/settings/minimum-wage", ADMIN, json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Please provide a minimum wage.");

        let (status, _) = call(
            &app.router,
            send_json(
                "PUT",
                "/api/settings/minimum-wage",
                ADMIN,
                json!({ "minimum_wage": "-1" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(
            &app.router,
            send_json(
                "PUT",
                "/api/settings/minimum-wage",
                ADMIN,
                json!({ "minimum_wage": "9860" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["minimum_wage"], "9860");

        let (_, body) = call(&app.router, get("/api/users", Some(ADMIN))).await;
        assert_eq!(body["minimum_wage"], "9860");
        assert_eq!(body["users"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_user_registration_and_deletion() {
        let app = create_test_app();
        let (status, body) = call(
            &app.router,
            send_json(
                "POST",
                "/api/users",
                ADMIN,
                json!({ "email": "new@example.com", "is_employee": true, "hourly_wage": "12.50" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["is_superuser"], false);
        let new_id = body["id"].as_u64().unwrap();

        let (status, _) = call(
            &app.router,
            send_json("POST", "/api/users", ADMIN, json!({ "email": "new@example.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let delete = Request::builder()
            .method("DELETE")
            .uri(format!("/api/users/{}", new_id))
            .header(IDENTITY_HEADER, ADMIN)
            .body(Body::empty())
            .unwrap();
        let (status, _) = call(&app.router, delete).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_holiday_management() {
        let app = create_test_app();
        let (status, body) = call(
            &app.router,
            send_json(
                "POST",
                "/api/holidays",
                ADMIN,
                json!({ "date": "2025-12-25", "name": "Christmas" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Christmas");

        let (status, body) = call(&app.router, get("/api/holidays", Some(EMPLOYEE))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (status, _) = call(
            &app.router,
            send_json(
                "POST",
                "/api/holidays",
                EMPLOYEE,
                json!({ "date": "2025-12-26", "name": "Nope" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let delete = Request::builder()
            .method("DELETE")
            .uri("/api/holidays/99")
            .header(IDENTITY_HEADER, ADMIN)
            .body(Body::empty())
            .unwrap();
        let (status, body) = call(&app.router, delete).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Holiday not found.");
    }

    #[tokio::test]
    async fn test_mutations_are_saved_to_the_data_file() {
        let path = env::temp_dir().join("hours_tracker_routes_saved.json");
        let _ = fs::remove_file(&path);
        let (store, employee, _) = create_test_store();
        let state = AppState::new(store, SettingsSlot::new(), Some(path.clone()));
        let router = build_router(state);

        let (status, _) = call(
            &router,
            send_json(
                "POST",
                "/api/hours/bulk",
                ADMIN,
                json!({ "date": "2025-03-03", "hours": "8" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(!temp_path(&path).exists());

        let (saved, _) = load_data_file(&path).unwrap();
        let rows = saved.find_work_hours(employee.id, None).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].hours, dec!(8));
        let _ = fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_failed_save_rolls_back_the_write() {
        // A directory cannot be replaced by the snapshot file
        let target = env::temp_dir().join("hours_tracker_routes_unwritable");
        let _ = fs::remove_dir_all(&target);
        fs::create_dir_all(&target).unwrap();

        let (store, employee, _) = create_test_store();
        let settings = SettingsSlot::new();
        settings.get_or_create().unwrap();
        let state = AppState::new(store.clone(), settings.clone(), Some(target.clone()));
        let router = build_router(state);

        let (status, body) = call(
            &router,
            send_json(
                "POST",
                "/api/hours/bulk",
                ADMIN,
                json!({ "date": "2025-03-03", "hours": "8" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error.");
        assert!(store.find_work_hours(employee.id, None).unwrap().is_empty());

        let (status, _) = call(
            &router,
            send_json(
                "PUT",
                "/api/settings/minimum-wage",
                ADMIN,
                json!({ "minimum_wage": "9860" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(settings.get().unwrap().unwrap().minimum_wage, dec!(0));
        assert!(!temp_path(&target).exists());

        let _ = fs::remove_dir_all(&target);
    }

    #[tokio::test]
    async fn test_minimum_wage_above_column_width_is_rejected() {
        let app = create_test_app();
        let (status, body) = call(
            &app.router,
            send_json(
                "PUT",
                "/api/settings/minimum-wage",
                ADMIN,
                json!({ "minimum_wage": "100000000" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Minimum wage cannot exceed 99999999.99 (100000000)");
    }
}
