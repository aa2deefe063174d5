mod support;

use std::time::Duration;

use ddmlp::dd::DdClient;
use ddmlp::mlp::{
    FitOptions, JobState, MlpFromArray, PollSettings, RuntimeSettings, ServiceConfig,
};
use ndarray::array;
use serde_json::json;
use support::fake_server::FakeServer;
use support::{envelope, error_envelope, train_status};

fn instant() -> RuntimeSettings {
    RuntimeSettings {
        poll: PollSettings {
            interval: Duration::ZERO,
            ..PollSettings::default()
        },
        train_grace: Duration::ZERO,
    }
}

#[test]
fn array_model_trains_and_predicts_over_http() {
    let prediction = json!({
        "status": {"code": 200, "msg": "OK"},
        "head": {"method": "/predict", "service": "flow"},
        "body": {"predictions": [
            {"uri": "1", "classes": [{"cat": "1", "prob": 0.3}, {"cat": "0", "prob": 0.7}]},
            {"uri": "0", "classes": [{"cat": "0", "prob": 0.2}, {"cat": "1", "prob": 0.8}]}
        ]}
    })
    .to_string();
    let server = FakeServer::start(vec![
        (404, error_envelope(404, 1002, "Service Not Found")),
        (201, envelope(201, "Created")),
        (
            201,
            json!({"status": {"code": 201, "msg": "Created"}, "head": {"method": "/train", "job": 7}})
                .to_string(),
        ),
        (200, train_status(7, "running", 50)),
        (200, train_status(7, "finished", 100)),
        (200, prediction),
    ]);

    let service = ServiceConfig {
        name: Some("flow".into()),
        nclasses: Some(2),
        ..ServiceConfig::default()
    };
    let client = DdClient::new("127.0.0.1", server.port()).unwrap();
    let mut mlp = MlpFromArray::new(client, service, instant()).unwrap();

    let x = array![[0.0, 1.0], [1.0, 0.0]];
    let mut seen_progress = Vec::new();
    let mut progress = |update: &ddmlp::mlp::TrainProgress<'_>| seen_progress.push(update.attempt);
    let outcome = mlp
        .fit_with_progress(&x, &[1.0, 0.0], &[], &FitOptions::default(), Some(&mut progress))
        .unwrap();
    assert_eq!(outcome.state, JobState::Finished);
    assert_eq!(outcome.polls, 2);
    assert_eq!(seen_progress, vec![1]);

    let proba = mlp.predict_proba(&x).unwrap();
    assert_eq!(proba, array![[0.2, 0.8], [0.7, 0.3]]);
    assert_eq!(mlp.generic().call_log().len(), 3);

    let seen = server.finish();
    let calls: Vec<(&str, &str)> = seen
        .iter()
        .map(|request| (request.method.as_str(), request.path()))
        .collect();
    assert_eq!(
        calls,
        vec![
            ("DELETE", "/services/flow"),
            ("PUT", "/services/flow"),
            ("POST", "/train"),
            ("GET", "/train"),
            ("GET", "/train"),
            ("POST", "/predict"),
        ]
    );
    assert!(seen[3].query().contains(&("job".to_string(), "7".to_string())));

    let train = seen[2].json();
    let data = train["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    let train_file = data[0].as_str().unwrap();
    assert!(train_file.contains("x_train_"));
    assert_eq!(std::fs::read_to_string(train_file).unwrap(), "1 1:1\n0 0:1\n");

    let predict = seen[5].json();
    let pred_file = predict["data"][0].as_str().unwrap();
    assert!(pred_file.contains("x_pred0_"));
    assert_eq!(std::fs::read_to_string(pred_file).unwrap(), "-1 1:1\n-1 0:1\n");
}

#[test]
fn failed_create_surfaces_server_message() {
    let server = FakeServer::start(vec![
        (200, envelope(200, "OK")),
        (400, error_envelope(400, 1006, "Service Bad Request Error")),
    ]);
    let service = ServiceConfig {
        name: Some("broken".into()),
        nclasses: Some(2),
        ..ServiceConfig::default()
    };
    let client = DdClient::new("127.0.0.1", server.port()).unwrap();
    let err = MlpFromArray::new(client, service, instant()).err().unwrap();
    let text = err.to_string();
    assert!(text.contains("create_service"));
    assert!(text.contains("Service Bad Request Error"));
    assert_eq!(server.finish().len(), 2);
}
