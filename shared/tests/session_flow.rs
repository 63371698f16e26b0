use crux_core::testing::{AppTester, Update};
use crux_http::protocol::{HttpResponse, HttpResult};
use crux_kv::error::KeyValueError;
use crux_kv::value::Value;
use crux_kv::{KeyValueOperation, KeyValueResponse, KeyValueResult};
use shared::{App, Effect, Event, Model, Route, ScreenView};
use shared::screens::{AuthEvent, TasksEvent};

type Tester = AppTester<App, Effect>;

const TOKEN_KEY: &str = "session:access_token";

/// Feeds events produced by resolved effects back into the app, collecting
/// every effect along the way.
fn drain(app: &Tester, model: &mut Model, update: Update<Effect, Event>) -> Vec<Effect> {
    let mut effects = update.effects;
    for event in update.events {
        let next = app.update(event, model);
        effects.extend(drain(app, model, next));
    }
    effects
}

fn boot(app: &Tester, model: &mut Model, stored: KeyValueResult) -> Vec<Effect> {
    let update = app.update(
        Event::AppStarted {
            api_base_url: None,
            now_ms: 1_000,
        },
        model,
    );
    let mut lookup = update
        .into_effects()
        .find_map(Effect::into_kv)
        .expect("token lookup requested");
    assert_eq!(
        lookup.operation,
        KeyValueOperation::Get {
            key: TOKEN_KEY.into()
        }
    );

    let update = app.resolve(&mut lookup, stored).expect("lookup resolves");
    drain(app, model, update)
}

fn stored_token(token: &str) -> KeyValueResult {
    KeyValueResult::Ok {
        response: KeyValueResponse::Get {
            value: Value::Bytes(token.as_bytes().to_vec()),
        },
    }
}

fn nothing_stored() -> KeyValueResult {
    KeyValueResult::Ok {
        response: KeyValueResponse::Get { value: Value::None },
    }
}

fn http_urls(effects: &[Effect]) -> Vec<String> {
    effects
        .iter()
        .filter_map(|e| match e {
            Effect::Http(request) => Some(request.operation.url.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_navigation_waits_for_bootstrap() {
    let app = Tester::default();
    let mut model = Model::default();

    let update = app.update(
        Event::Navigate {
            path: "/tasks".into(),
        },
        &mut model,
    );
    assert!(update.effects().all(|e| !e.is_http()));
    assert_eq!(model.route, None);
    assert_eq!(app.view(&model).screen, ScreenView::Blank);

    let effects = boot(&app, &mut model, stored_token("tok-1"));
    assert_eq!(model.route, Some(Route::Tasks));
    assert!(http_urls(&effects)
        .iter()
        .any(|url| url.ends_with("/tasks")));
}

#[test]
fn test_restored_token_is_sent_as_bearer() {
    let app = Tester::default();
    let mut model = Model::default();

    let effects = boot(&app, &mut model, stored_token("tok-1"));
    assert!(model.session.is_authenticated());
    assert_eq!(model.route, Some(Route::Dashboard));

    let request = effects
        .into_iter()
        .find_map(Effect::into_http)
        .expect("dashboard load");
    let auth = request
        .operation
        .headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case("authorization"))
        .expect("authorization header");
    assert_eq!(auth.value, "Bearer tok-1");
}

#[test]
fn test_storage_failure_fails_closed() {
    let app = Tester::default();
    let mut model = Model::default();

    let effects = boot(
        &app,
        &mut model,
        KeyValueResult::Err {
            error: KeyValueError::Io {
                message: "keychain locked".into(),
            },
        },
    );
    assert!(!model.session.is_authenticated());
    assert!(!model.session.is_loading());
    assert_eq!(model.route, Some(Route::Login));
    assert!(http_urls(&effects).is_empty());
}

#[test]
fn test_protected_route_redirects_to_login() {
    let app = Tester::default();
    let mut model = Model::default();
    boot(&app, &mut model, nothing_stored());

    app.update(
        Event::Navigate {
            path: "/plans".into(),
        },
        &mut model,
    );
    assert_eq!(model.route, Some(Route::Login));

    app.update(
        Event::Navigate {
            path: "/register".into(),
        },
        &mut model,
    );
    assert_eq!(model.route, Some(Route::Register));
}

#[test]
fn test_root_and_unknown_paths_land_on_dashboard() {
    let app = Tester::default();
    let mut model = Model::default();
    boot(&app, &mut model, stored_token("tok-1"));

    app.update(
        Event::Navigate {
            path: "/tasks".into(),
        },
        &mut model,
    );
    app.update(Event::Navigate { path: "/".into() }, &mut model);
    assert_eq!(model.route, Some(Route::Dashboard));

    app.update(
        Event::Navigate {
            path: "/plans".into(),
        },
        &mut model,
    );
    app.update(
        Event::Navigate {
            path: "/no-such-page".into(),
        },
        &mut model,
    );
    assert_eq!(model.route, Some(Route::Dashboard));
}

#[test]
fn test_login_posts_form_and_persists_token() {
    let app = Tester::default();
    let mut model = Model::default();
    boot(&app, &mut model, nothing_stored());

    for event in [
        AuthEvent::EmailChanged("ada@example.com".into()),
        AuthEvent::PasswordChanged("hunter22".into()),
    ] {
        app.update(Event::Auth(event), &mut model);
    }
    let update = app.update(Event::Auth(AuthEvent::SubmitLogin), &mut model);
    let mut request = update
        .into_effects()
        .find_map(Effect::into_http)
        .expect("login request");

    assert_eq!(request.operation.method, "POST");
    assert!(request.operation.url.ends_with("/auth/login"));
    let body = String::from_utf8(request.operation.body.clone()).unwrap();
    assert!(body.contains("username=ada%40example.com"));
    assert!(body.contains("password=hunter22"));

    let update = app
        .resolve(
            &mut request,
            HttpResult::Ok(
                HttpResponse::ok()
                    .json(serde_json::json!({"access_token": "tok-2", "token_type": "bearer"}))
                    .build(),
            ),
        )
        .expect("login resolves");
    let effects = drain(&app, &mut model, update);

    assert!(model.session.is_authenticated());
    assert_eq!(model.route, Some(Route::Dashboard));
    let saved = effects.into_iter().find_map(Effect::into_kv).expect("token saved");
    assert_eq!(
        saved.operation,
        KeyValueOperation::Set {
            key: TOKEN_KEY.into(),
            value: b"tok-2".to_vec(),
        }
    );
}

#[test]
fn test_login_validation_sends_nothing() {
    let app = Tester::default();
    let mut model = Model::default();
    boot(&app, &mut model, nothing_stored());

    let update = app.update(Event::Auth(AuthEvent::SubmitLogin), &mut model);
    assert!(update.effects().all(|e| !e.is_http()));
    let view = app.view(&model);
    assert_eq!(view.error.unwrap().message, "Email is required");
}

#[test]
fn test_rejected_login_keeps_user_signed_out() {
    let app = Tester::default();
    let mut model = Model::default();
    boot(&app, &mut model, nothing_stored());

    app.update(Event::Auth(AuthEvent::EmailChanged("a@b.c".into())), &mut model);
    app.update(Event::Auth(AuthEvent::PasswordChanged("wrong1".into())), &mut model);
    let update = app.update(Event::Auth(AuthEvent::SubmitLogin), &mut model);
    let mut request = update.into_effects().find_map(Effect::into_http).unwrap();

    let update = app
        .resolve(
            &mut request,
            HttpResult::Ok(
                HttpResponse::status(401)
                    .json(serde_json::json!({"detail": "Incorrect email or password"}))
                    .build(),
            ),
        )
        .unwrap();
    let effects = drain(&app, &mut model, update);

    assert!(!model.session.is_authenticated());
    assert_eq!(model.route, Some(Route::Login));
    assert!(effects.iter().all(|e| !e.is_kv()));
    assert_eq!(
        app.view(&model).error.unwrap().message,
        "Incorrect email or password"
    );
}

#[test]
fn test_logout_clears_stored_token() {
    let app = Tester::default();
    let mut model = Model::default();
    boot(&app, &mut model, stored_token("tok-1"));

    let update = app.update(Event::LogoutRequested, &mut model);
    let delete = update.into_effects().find_map(Effect::into_kv).expect("token cleared");
    assert_eq!(
        delete.operation,
        KeyValueOperation::Delete {
            key: TOKEN_KEY.into()
        }
    );
    assert!(!model.session.is_authenticated());
    assert_eq!(model.route, Some(Route::Login));
}

#[test]
fn test_unauthorized_response_ends_session() {
    let app = Tester::default();
    let mut model = Model::default();
    boot(&app, &mut model, stored_token("expired"));

    let update = app.update(
        Event::Navigate {
            path: "/tasks".into(),
        },
        &mut model,
    );
    let mut request = update.into_effects().find_map(Effect::into_http).unwrap();

    let update = app
        .resolve(
            &mut request,
            HttpResult::Ok(
                HttpResponse::status(401)
                    .json(serde_json::json!({"detail": "Could not validate credentials"}))
                    .build(),
            ),
        )
        .unwrap();
    let effects = drain(&app, &mut model, update);

    assert!(!model.session.is_authenticated());
    assert_eq!(model.route, Some(Route::Login));
    assert!(effects.iter().any(|e| matches!(
        e,
        Effect::KeyValue(req) if matches!(req.operation, KeyValueOperation::Delete { .. })
    )));
    assert_eq!(
        app.view(&model).error.unwrap().message,
        "Your session has expired. Please log in again."
    );
}

#[test]
fn test_stale_screen_events_are_ignored() {
    let app = Tester::default();
    let mut model = Model::default();
    boot(&app, &mut model, stored_token("tok-1"));

    let update = app.update(Event::Tasks(TasksEvent::Create), &mut model);
    assert!(update.effects().all(|e| !e.is_http()));
    assert_eq!(model.route, Some(Route::Dashboard));
    assert!(model.feedback.error.is_none());
}

#[test]
fn test_feedback_expires_on_tick() {
    let app = Tester::default();
    let mut model = Model::default();
    boot(&app, &mut model, nothing_stored());

    app.update(Event::Auth(AuthEvent::SubmitLogin), &mut model);
    assert!(model.feedback.error.is_some());

    let update = app.update(Event::TimerTick { now_ms: 2_000 }, &mut model);
    assert!(update.effects().all(|e| !e.is_render()));
    assert!(model.feedback.error.is_some());

    let update = app.update(Event::TimerTick { now_ms: 4_000 }, &mut model);
    assert!(update.effects().any(Effect::is_render));
    assert!(model.feedback.error.is_none());
}
