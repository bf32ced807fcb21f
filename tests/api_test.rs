use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use serde_json::Value;
use student_dashboard::{api, Config};

const CLASS: &str = "\
StudentID,Name,Gender,AttendanceRate,StudyHours,PreviousGrade,subject,exam_type,marks
S001,Tanvi Shah,Female,85.5,4.5,67,Mathematics,Unit Test,78
S001,Tanvi Shah,Female,85.5,4.5,67,Mathematics,Final,84
S002,Arjun Rao,Male,58,2,45,Mathematics,Unit Test,52
S003,Meera Iyer,Female,92,6,88,Science,Midterm,91
S004,Kabir Das,Male,74,3.5,61,Science,Midterm,66
S005,Omar Ali,Male,49,1,38,Science,Final,35
";

macro_rules! app {
    () => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(Config { ranking_size: 2, ..Config::default() }))
                .configure(api::configure),
        )
        .await
    };
}

#[actix_web::test]
async fn health_reports_running() {
    let app = app!();
    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert!(resp.status().is_success());
}

#[actix_web::test]
async fn column_guide_lists_nine_columns() {
    let app = app!();
    let body: Value = test::call_and_read_body_json(&app, test::TestRequest::get().uri("/columns").to_request()).await;
    assert_eq!(body.as_array().unwrap().len(), 9);
    assert_eq!(body[0]["name"], "StudentID");
}

#[actix_web::test]
async fn dashboard_uses_configured_ranking_size() {
    let app = app!();
    let req = test::TestRequest::post()
        .uri("/dashboard?format=csv&student=Tanvi%20Shah")
        .set_payload(CLASS)
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    let performance = &body["performance"]["data"];
    assert_eq!(performance["score_column"], "marks");
    assert_eq!(performance["top_students"].as_array().unwrap().len(), 2);
    assert_eq!(performance["top_students"][0]["name"], "Meera Iyer");

    let points = body["comparison"]["data"]["points"].as_array().unwrap();
    assert_eq!(points[0]["exam_type"], "Unit Test");
    assert_eq!(points[1]["exam_type"], "Final");
}

#[actix_web::test]
async fn dashboard_selection_errors_stay_in_their_panel() {
    let app = app!();
    let req = test::TestRequest::post()
        .uri("/dashboard?student=Nobody")
        .set_payload(CLASS)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["comparison"]["status"], "error");
    assert_eq!(body["prediction"]["status"], "error");
    assert_eq!(body["subjects"]["status"], "ok");
}

#[actix_web::test]
async fn predict_unknown_student_is_not_found() {
    let app = app!();
    let req = test::TestRequest::post()
        .uri("/predict?format=csv&student=Nobody")
        .set_payload(CLASS)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "No student named 'Nobody' exists in the dataset.");
}

#[actix_web::test]
async fn predict_defaults_to_the_first_student() {
    let app = app!();
    let req = test::TestRequest::post().uri("/predict").set_payload(CLASS).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["student"], "Tanvi Shah");
    assert_eq!(body["label_source"], "synthetic");
    let score = body["predicted_score"].as_f64().unwrap();
    assert!((0.0..=100.0).contains(&score));
}

#[actix_web::test]
async fn upload_without_name_column_is_unprocessable() {
    let app = app!();
    let req = test::TestRequest::post()
        .uri("/dashboard?format=csv")
        .set_payload("Student,marks\nAda,50\n")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[actix_web::test]
async fn unreadable_json_is_a_bad_request() {
    let app = app!();
    let req = test::TestRequest::post()
        .uri("/dashboard?format=json")
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn recommend_returns_band_and_message() {
    let app = app!();
    let req = test::TestRequest::post()
        .uri("/recommend")
        .set_json(serde_json::json!({"grade": 70.0}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["band"], "Proceed");
    assert_eq!(body["message"], "Proceed to the next subject.");
}

#[actix_web::test]
async fn predict_succeeds_on_collinear_rows() {
    let app = app!();
    let upload = "Name,AttendanceRate,PreviousGrade,StudyHours\nAda,90,80,5\nBo,50,40,1\nCy,70,60,3\n";
    let req = test::TestRequest::post()
        .uri("/predict?format=csv&student=Cy")
        .set_payload(upload)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["feature_rank"], 1);
    let score = body["predicted_score"].as_f64().unwrap();
    assert!((0.0..=100.0).contains(&score));
}
