use std::cell::{Cell, RefCell};

use crate::error::CallScopeError;
use crate::http::{HttpDriver, HttpMethod, HttpResponse, Params};

/// 記録されたリクエスト
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: HttpMethod,
    pub path: String,
    pub params: Params,
}

type Handler = Box<dyn Fn(&Params) -> HttpResponse>;

struct Route {
    method: Option<HttpMethod>,
    path: String,
    handler: Handler,
}

/// テスト用の共通モックドライバ
/// - パス (とメソッド) ごとのルートテーブル
/// - 発行されたリクエストの記録
/// - オプションの失敗注入
///
/// 未登録のパスには 404 と XML でない本文を返す。
pub struct MockDriver {
    routes: RefCell<Vec<Route>>,
    pub requests: RefCell<Vec<RecordedRequest>>,
    pub issue_count: Cell<usize>,
    pub should_fail: Cell<bool>,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    pub fn new() -> Self {
        Self {
            routes: RefCell::new(Vec::new()),
            requests: RefCell::new(Vec::new()),
            issue_count: Cell::new(0),
            should_fail: Cell::new(false),
        }
    }

    /// 任意のメソッドで固定の本文 (status 200) を返すルートを登録する
    pub fn route(self, path: &str, body: &str) -> Self {
        let body = body.to_string();
        self.route_fn(None, path, move |_| HttpResponse {
            status: 200,
            body: body.clone(),
        })
    }

    /// パラメータから応答を組み立てるルートを登録する
    pub fn route_fn<F>(self, method: Option<HttpMethod>, path: &str, handler: F) -> Self
    where
        F: Fn(&Params) -> HttpResponse + 'static,
    {
        self.routes.borrow_mut().push(Route {
            method,
            path: path.to_string(),
            handler: Box::new(handler),
        });
        self
    }

    /// should_fail フラグを設定する
    pub fn set_should_fail(&self, fail: bool) {
        self.should_fail.set(fail);
    }

    /// 記録されたリクエスト数
    pub fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }

    /// 最後に記録されたリクエスト
    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.requests.borrow().last().cloned()
    }

    /// 指定パスへのリクエストのみを返す
    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests
            .borrow()
            .iter()
            .filter(|r| r.path == path)
            .cloned()
            .collect()
    }
}

impl HttpDriver for MockDriver {
    fn issue(
        &self,
        method: HttpMethod,
        path: &str,
        params: &Params,
    ) -> Result<HttpResponse, CallScopeError> {
        self.issue_count.set(self.issue_count.get() + 1);
        if self.should_fail.get() {
            return Err(CallScopeError::Transport("mock failure".to_string()));
        }
        self.requests.borrow_mut().push(RecordedRequest {
            method,
            path: path.to_string(),
            params: params.clone(),
        });

        let routes = self.routes.borrow();
        let route = routes
            .iter()
            .find(|r| r.path == path && r.method.map_or(true, |m| m == method));
        Ok(match route {
            Some(route) => (route.handler)(params),
            None => HttpResponse {
                status: 404,
                body: "Not Found".to_string(),
            },
        })
    }
}

// ===== デモアプリ =====
//
// 着信シナリオを返す小さなアプリケーション。統合テストとベンチマークで使う。

pub const START_PATH: &str = "/twilio/test_start";
pub const ACTION_PATH: &str = "/twilio/test_action";
pub const REDIRECT_PATH: &str = "/twilio/test_redirect";
pub const SAY_PATH: &str = "/twilio/test_say";
pub const PLAY_PATH: &str = "/twilio/test_play";
pub const DIAL_WITH_ACTION_PATH: &str = "/twilio/test_dial_with_action";
pub const DIAL_WITH_NO_ACTION_PATH: &str = "/twilio/test_dial_with_no_action";
pub const DIAL_WITH_SIP_PATH: &str = "/twilio/test_dial_with_sip";
pub const HANGUP_PATH: &str = "/twilio/test_hangup";
pub const GATHER_FINISH_ON_ASTERISK_PATH: &str = "/twilio/test_gather_finish_on_asterisk";
pub const RECORD_PATH: &str = "/twilio/test_record";
pub const CALL_STATUS_PATH: &str = "/twilio/test_call_status";
pub const PARTIAL_RESULT_CALLBACK_PATH: &str = "/twilio/test_partial_result_callback";

pub const START_XML: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<Response>
  <Gather action="/twilio/test_action" partialResultCallback="/twilio/test_partial_result_callback">
    <Say>Please enter some digits.</Say>
  </Gather>
</Response>"##;

pub const REDIRECT_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Response>
  <Redirect>/twilio/test_start</Redirect>
</Response>"#;

pub const SAY_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Response>
  <Say>This is a say page.</Say>
</Response>"#;

pub const PLAY_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Response>
  <Play>/path/to/an/audio/clip.mp3</Play>
</Response>"#;

pub const DIAL_WITH_ACTION_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Response>
  <Dial action="http://example.org:3000/call_me_back">18001234567</Dial>
</Response>"#;

pub const DIAL_WITH_NO_ACTION_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Response>
  <Dial>18001234567</Dial>
</Response>"#;

pub const DIAL_WITH_SIP_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Response>
  <Dial>
    <Sip username="foo" password="bar">sip:18885551234@sip.foo.bar</Sip>
  </Dial>
</Response>"#;

pub const HANGUP_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Response>
  <Hangup/>
</Response>"#;

pub const GATHER_FINISH_ON_ASTERISK_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Response>
  <Gather action="/twilio/test_action" finishOnKey="*">
    <Say>Please enter some digits.</Say>
  </Gather>
</Response>"#;

pub const RECORD_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Response>
  <Record action="http://example.org:3000/record_this_call" maxLength="20" finishOnKey="*"/>
</Response>"#;

fn say_document(text: &str) -> HttpResponse {
    HttpResponse {
        status: 200,
        body: format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Response>\n  <Say>{}</Say>\n</Response>",
            text
        ),
    }
}

/// デモアプリのルートを登録したモックドライバ
pub fn demo_app() -> MockDriver {
    MockDriver::new()
        .route(START_PATH, START_XML)
        .route(REDIRECT_PATH, REDIRECT_XML)
        .route(SAY_PATH, SAY_XML)
        .route(PLAY_PATH, PLAY_XML)
        .route(DIAL_WITH_ACTION_PATH, DIAL_WITH_ACTION_XML)
        .route(DIAL_WITH_NO_ACTION_PATH, DIAL_WITH_NO_ACTION_XML)
        .route(DIAL_WITH_SIP_PATH, DIAL_WITH_SIP_XML)
        .route(HANGUP_PATH, HANGUP_XML)
        .route(GATHER_FINISH_ON_ASTERISK_PATH, GATHER_FINISH_ON_ASTERISK_XML)
        .route(RECORD_PATH, RECORD_XML)
        .route_fn(None, ACTION_PATH, |params| {
            let entered = params
                .get("Digits")
                .or_else(|| params.get("SpeechResult"))
                .unwrap_or("");
            say_document(&format!("You entered {}.", entered))
        })
        .route_fn(None, CALL_STATUS_PATH, |params| {
            match params.get("CallStatus") {
                Some("ringing") => say_document("Your call is ringing."),
                _ => say_document("Your call is in progress."),
            }
        })
        .route_fn(None, PARTIAL_RESULT_CALLBACK_PATH, |_| HttpResponse {
            status: 200,
            body: "OK".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> Params {
        [("CallSid", "CA1")].into_iter().collect()
    }

    // --- ルーティングのテスト ---

    #[test]
    fn mock_driver_returns_routed_body() {
        let driver = MockDriver::new().route("/a", "<Response/>");
        let response = driver.issue(HttpMethod::Post, "/a", &params()).unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "<Response/>");
    }

    #[test]
    fn mock_driver_unknown_path_is_404() {
        let driver = MockDriver::new();
        let response = driver.issue(HttpMethod::Get, "/missing", &params()).unwrap();
        assert_eq!(response.status, 404);
    }

    #[test]
    fn mock_driver_route_respects_method() {
        let driver = MockDriver::new().route_fn(Some(HttpMethod::Get), "/only_get", |_| HttpResponse {
            status: 200,
            body: "<Response/>".to_string(),
        });
        assert_eq!(driver.issue(HttpMethod::Get, "/only_get", &params()).unwrap().status, 200);
        assert_eq!(driver.issue(HttpMethod::Post, "/only_get", &params()).unwrap().status, 404);
    }

    // --- リクエスト記録のテスト ---

    #[test]
    fn mock_driver_records_requests() {
        let driver = MockDriver::new().route("/a", "<Response/>");
        driver.issue(HttpMethod::Post, "/a", &params()).unwrap();
        driver.issue(HttpMethod::Get, "/b", &Params::new()).unwrap();

        assert_eq!(driver.request_count(), 2);
        let requests = driver.requests.borrow();
        assert_eq!(requests[0].method, HttpMethod::Post);
        assert_eq!(requests[0].path, "/a");
        assert_eq!(requests[0].params.get("CallSid"), Some("CA1"));
        assert_eq!(requests[1].path, "/b");
    }

    #[test]
    fn mock_driver_requests_to_filters_by_path() {
        let driver = MockDriver::new();
        driver.issue(HttpMethod::Post, "/a", &params()).unwrap();
        driver.issue(HttpMethod::Post, "/b", &params()).unwrap();
        driver.issue(HttpMethod::Post, "/a", &params()).unwrap();
        assert_eq!(driver.requests_to("/a").len(), 2);
        assert_eq!(driver.last_request().unwrap().path, "/a");
    }

    // --- 失敗注入のテスト ---

    #[test]
    fn mock_driver_returns_error_when_should_fail_is_true() {
        let driver = MockDriver::new().route("/a", "<Response/>");
        driver.set_should_fail(true);

        let result = driver.issue(HttpMethod::Post, "/a", &params());
        assert!(matches!(result, Err(CallScopeError::Transport(_))));

        // 失敗時はリクエストが記録されないこと
        assert_eq!(driver.request_count(), 0);
        // issue_count は失敗時もインクリメントされる
        assert_eq!(driver.issue_count.get(), 1);
    }

    // --- デモアプリのテスト ---

    #[test]
    fn demo_app_echoes_digits_then_speech() {
        let app = demo_app();
        let digits: Params = [("Digits", "123")].into_iter().collect();
        let body = app.issue(HttpMethod::Post, ACTION_PATH, &digits).unwrap().body;
        assert!(body.contains("You entered 123."));

        let speech: Params = [("SpeechResult", "hello")].into_iter().collect();
        let body = app.issue(HttpMethod::Post, ACTION_PATH, &speech).unwrap().body;
        assert!(body.contains("You entered hello."));
    }

    #[test]
    fn demo_app_call_status_branches() {
        let app = demo_app();
        let ringing: Params = [("CallStatus", "ringing")].into_iter().collect();
        let body = app.issue(HttpMethod::Post, CALL_STATUS_PATH, &ringing).unwrap().body;
        assert!(body.contains("Your call is ringing."));

        let body = app.issue(HttpMethod::Post, CALL_STATUS_PATH, &Params::new()).unwrap().body;
        assert!(body.contains("Your call is in progress."));
    }

    #[test]
    fn demo_app_implements_http_driver() {
        let _: Box<dyn HttpDriver> = Box::new(demo_app());
    }
}
