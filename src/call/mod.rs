// Call module
//
// Simulates one phone call against the application under test. A CallSession
// issues the initial request and owns the call identity; every advance
// (redirect, gather submission, partial speech result) synthesizes the
// parameters the telephony network would send and fetches the next document
// through the HttpDriver.

mod options;
mod params;

pub use options::*;
pub use params::{generate_call_sid, strip_finish_key, GatherInput, DEFAULT_CALL_STATUS, DEFAULT_FINISH_ON_KEY};
use params::*;

use std::fmt::{self, Display};
use std::rc::Rc;

use crate::debug::{format_advance_log, format_error_log, format_request_log, format_response_log, DebugEvent};
use crate::error::CallScopeError;
use crate::http::{HttpDriver, HttpMethod, HttpResponse, Params};
use crate::scope::ScopedDocument;
use crate::twiml::message::{Element, ElementKind};

/// One fetched document: where it came from, the raw body, and the scope
/// queries run against.
#[derive(Debug, Clone)]
pub struct Page {
    path: String,
    status: u16,
    body: Rc<str>,
    scope: ScopedDocument,
}

impl Page {
    pub(crate) fn load(path: &str, response: HttpResponse) -> Result<Self, CallScopeError> {
        let scope = ScopedDocument::parse(&response.body)?;
        Ok(Page {
            path: path.to_string(),
            status: response.status,
            body: Rc::from(response.body),
            scope,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn scope(&self) -> &ScopedDocument {
        &self.scope
    }

    /// Same page, focused on the first element of `kind` (focus or child)
    pub(crate) fn descend(&self, kind: ElementKind) -> Result<Page, CallScopeError> {
        Ok(Page {
            path: self.path.clone(),
            status: self.status,
            body: Rc::clone(&self.body),
            scope: self.scope.within(kind)?,
        })
    }

    fn gather_element(&self) -> Result<&Element, CallScopeError> {
        if self.scope.is_a(&ElementKind::Gather) {
            Ok(self.scope.focus_element())
        } else {
            Err(CallScopeError::NotAGather)
        }
    }

    /// Where gathered input goes: the `action` attribute, else this page
    fn gather_action(&self) -> Result<&str, CallScopeError> {
        let gather = self.gather_element()?;
        Ok(gather
            .attribute("action")
            .filter(|action| !action.is_empty())
            .unwrap_or(&self.path))
    }
}

/// Issue one request, logging both sides when `debug` is set
fn send_request(
    driver: &dyn HttpDriver,
    call_sid: &str,
    debug: bool,
    method: HttpMethod,
    path: &str,
    params: &Params,
) -> Result<HttpResponse, CallScopeError> {
    if debug {
        eprintln!("{}", format_request_log(call_sid, method, path, params));
    }
    match driver.issue(method, path, params) {
        Ok(response) => {
            if debug {
                eprintln!(
                    "{}",
                    format_response_log(call_sid, path, response.status, response.body.len())
                );
            }
            Ok(response)
        }
        Err(e) => {
            if debug {
                eprintln!("{}", format_error_log(call_sid, path, &e.to_string()));
            }
            Err(e)
        }
    }
}

/// A simulated call. The session is its own root call.
pub struct CallSession {
    identity: CallIdentity,
    driver: Box<dyn HttpDriver>,
    page: Page,
    debug: bool,
}

impl fmt::Debug for CallSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallSession")
            .field("identity", &self.identity)
            .field("current_path", &self.page.path)
            .field("debug", &self.debug)
            .finish()
    }
}

impl CallSession {
    /// Place a call: issue the initial request to `path` and load the answer.
    pub fn initiate<D: HttpDriver + 'static>(
        driver: D,
        path: &str,
        from: &str,
        to: &str,
        options: CallOptions,
    ) -> Result<Self, CallScopeError> {
        let identity = CallIdentity {
            sid: options.call_sid.unwrap_or_else(generate_call_sid),
            initial_path: path.to_string(),
            http_method: options.method,
            from: from.to_string(),
            to: to.to_string(),
            is_machine: options.is_machine,
            called: options.called,
            direction: options.direction,
        };
        let driver: Box<dyn HttpDriver> = Box::new(driver);

        let params = build_base_params(&identity, options.call_status.as_deref());
        let response = send_request(
            driver.as_ref(),
            &identity.sid,
            options.debug,
            options.method,
            path,
            &params,
        )?;
        let page = Page::load(path, response)?;

        Ok(Self {
            identity,
            driver,
            page,
            debug: options.debug,
        })
    }

    pub fn identity(&self) -> &CallIdentity {
        &self.identity
    }

    pub fn sid(&self) -> &str {
        &self.identity.sid
    }

    pub fn initial_path(&self) -> &str {
        &self.identity.initial_path
    }

    /// Method of the initial request
    pub fn http_method(&self) -> HttpMethod {
        self.identity.http_method
    }

    pub fn from_number(&self) -> &str {
        &self.identity.from
    }

    pub fn to_number(&self) -> &str {
        &self.identity.to
    }

    pub fn is_machine(&self) -> bool {
        self.identity.is_machine
    }

    pub fn called(&self) -> Option<&str> {
        self.identity.called.as_deref()
    }

    pub fn direction(&self) -> &str {
        &self.identity.direction
    }

    fn send(&self, method: HttpMethod, path: &str, params: &Params) -> Result<HttpResponse, CallScopeError> {
        send_request(self.driver.as_ref(), &self.identity.sid, self.debug, method, path, params)
    }

    /// Every advance ends here: synthesize parameters, issue, parse.
    fn next_page(
        &self,
        event: DebugEvent,
        from: &Page,
        method: HttpMethod,
        target: &str,
        extra: &Params,
        options: &AdvanceOptions,
    ) -> Result<Page, CallScopeError> {
        let method = options.method.unwrap_or(method);
        let params = build_request_params(&self.identity, extra, options);
        if self.debug {
            eprintln!("{}", format_advance_log(event, &self.identity.sid, from.path(), target));
        }
        let response = self.send(method, target, &params)?;
        Page::load(target, response)
    }

    fn redirect_page(&self, from: &Page, options: &AdvanceOptions) -> Result<Page, CallScopeError> {
        let target = from.scope().redirect().ok_or(CallScopeError::NoRedirect)?;
        let method = HttpMethod::from_attribute(target.method.as_deref());
        self.next_page(DebugEvent::Redirect, from, method, &target.url, &Params::new(), options)
    }

    fn gather_page(
        &self,
        gather: &Page,
        input: &GatherInput,
        options: &AdvanceOptions,
    ) -> Result<Page, CallScopeError> {
        let element = gather.gather_element()?;
        let method = HttpMethod::from_attribute(element.attribute("method"));
        let action = gather.gather_action()?;
        self.next_page(DebugEvent::GatherSubmit, gather, method, action, &input.to_params(), options)
    }

    fn send_partial_result(
        &self,
        gather: &Page,
        stable: &str,
        unstable: &str,
        options: &AdvanceOptions,
    ) -> Result<HttpResponse, CallScopeError> {
        let element = gather.gather_element()?;
        let callback = element
            .attribute("partialResultCallback")
            .filter(|url| !url.is_empty())
            .ok_or(CallScopeError::MissingAttribute {
                element: ElementKind::Gather,
                attribute: "partialResultCallback",
            })?;
        let method = options.method.unwrap_or_else(|| {
            HttpMethod::from_attribute(element.attribute("partialResultCallbackMethod"))
        });
        let params = build_request_params(&self.identity, &build_partial_params(stable, unstable), options);
        if self.debug {
            eprintln!(
                "{}",
                format_advance_log(DebugEvent::PartialResult, &self.identity.sid, gather.path(), callback)
            );
        }
        self.send(method, callback, &params)
    }
}

/// A view of a call derived from a session: the page after a redirect, or a
/// descent into a nested element. Borrows its root session.
///
/// Input pressed or spoken in a scope created by `within_gather` is held
/// until the block ends; in any other scope it is submitted at once.
#[derive(Debug)]
pub struct CallScope<'r> {
    root: &'r CallSession,
    page: Page,
    pending: Option<GatherInput>,
    nested: bool,
}

impl<'r> CallScope<'r> {
    fn top_level(root: &'r CallSession, page: Page) -> Self {
        Self {
            root,
            page,
            pending: None,
            nested: false,
        }
    }

    fn nested(root: &'r CallSession, page: Page) -> Self {
        Self {
            root,
            page,
            pending: None,
            nested: true,
        }
    }

    /// Input waiting for the end of the enclosing gather block
    pub fn pending_input(&self) -> Option<&GatherInput> {
        self.pending.as_ref()
    }
}

mod sealed {
    use super::{CallScopeError, GatherInput, Page};

    pub trait Sealed {
        fn stage_input(&mut self, input: GatherInput) -> Result<(), CallScopeError>;
        fn set_page(&mut self, page: Page);
    }
}

impl sealed::Sealed for CallSession {
    // Only reachable when the document root itself is a <Gather>
    fn stage_input(&mut self, input: GatherInput) -> Result<(), CallScopeError> {
        let next = self.gather_page(&self.page, &input, &AdvanceOptions::default())?;
        self.page = next;
        Ok(())
    }

    fn set_page(&mut self, page: Page) {
        self.page = page;
    }
}

impl sealed::Sealed for CallScope<'_> {
    fn stage_input(&mut self, input: GatherInput) -> Result<(), CallScopeError> {
        if self.nested {
            self.pending = Some(input);
            return Ok(());
        }
        let next = self.root.gather_page(&self.page, &input, &AdvanceOptions::default())?;
        self.page = next;
        Ok(())
    }

    fn set_page(&mut self, page: Page) {
        self.page = page;
        self.nested = false;
        self.pending = None;
    }
}

/// Operations shared by a session and every scope derived from it
pub trait CallFlow: sealed::Sealed {
    /// The session this call flow originated from
    fn root_call(&self) -> &CallSession;

    fn page(&self) -> &Page;

    fn current_path(&self) -> &str {
        self.page().path()
    }

    /// Raw body of the current document
    fn response_xml(&self) -> &str {
        self.page().body()
    }

    fn status(&self) -> u16 {
        self.page().status()
    }

    fn scope(&self) -> &ScopedDocument {
        self.page().scope()
    }

    // --- predicates ---

    fn has_redirect(&self) -> bool {
        self.scope().has_redirect()
    }

    fn has_redirect_to(&self, url: &str) -> bool {
        self.scope().has_redirect_to(url)
    }

    fn has_say(&self, text: &str) -> bool {
        self.scope().has_say(text)
    }

    fn has_play(&self, path: &str) -> bool {
        self.scope().has_play(path)
    }

    fn has_play_exact(&self, path: &str) -> bool {
        self.scope().has_play_exact(path)
    }

    fn has_dial(&self, number: &str) -> bool {
        self.scope().has_dial(number)
    }

    fn has_hangup(&self) -> bool {
        self.scope().has_hangup()
    }

    fn has_gather(&self) -> bool {
        self.scope().has_gather()
    }

    fn has_record(&self) -> bool {
        self.scope().has_record()
    }

    fn has_action_on_dial(&self, url: &str) -> bool {
        self.scope().has_action_on(ElementKind::Dial, url)
    }

    fn has_action_on_record(&self, url: &str) -> bool {
        self.scope().has_action_on(ElementKind::Record, url)
    }

    fn has_max_length_on_record(&self, value: impl Display) -> bool
    where
        Self: Sized,
    {
        self.scope().has_max_length_on_record(value)
    }

    fn has_finish_on_key_on_record(&self, key: &str) -> bool {
        self.scope().has_finish_on_key_on_record(key)
    }

    fn has_sip(&self) -> bool {
        self.scope().has_sip()
    }

    fn has_uri_on_sip(&self, uri: &str) -> bool {
        self.scope().has_uri_on_sip(uri)
    }

    fn has_username_on_uri(&self, name: &str) -> bool {
        self.scope().has_username_on_uri(name)
    }

    fn has_password_on_uri(&self, password: &str) -> bool {
        self.scope().has_password_on_uri(password)
    }

    // --- redirect ---

    /// Follow the `<Redirect>` into a new scope; this one is left as is.
    fn follow_redirect(&self, options: &AdvanceOptions) -> Result<CallScope<'_>, CallScopeError> {
        let root = self.root_call();
        let page = root.redirect_page(self.page(), options)?;
        Ok(CallScope::top_level(root, page))
    }

    /// Follow the `<Redirect>` and replace the current page
    fn follow_redirect_in_place(&mut self, options: &AdvanceOptions) -> Result<(), CallScopeError> {
        let page = self.root_call().redirect_page(self.page(), options)?;
        self.set_page(page);
        Ok(())
    }

    // --- gather ---

    /// True only when the focus itself is a `<Gather>`
    fn is_gather(&self) -> bool {
        self.scope().is_a(&ElementKind::Gather)
    }

    /// `action` of the focused `<Gather>`, or the current path when the
    /// attribute is missing or empty. `NotAGather` outside a gather.
    fn gather_action(&self) -> Result<String, CallScopeError> {
        self.page().gather_action().map(str::to_string)
    }

    /// Enter digits. One trailing finish key (`finishOnKey`, default `#`) is
    /// stripped; an empty `finishOnKey` disables stripping.
    fn press(&mut self, digits: &str) -> Result<(), CallScopeError> {
        let gather = self.page().gather_element()?;
        let finish_key = gather.attribute("finishOnKey").unwrap_or(DEFAULT_FINISH_ON_KEY);
        let digits = strip_finish_key(digits, finish_key).to_string();
        self.stage_input(GatherInput::Digits(digits))
    }

    /// Final speech recognition result
    fn speak(&mut self, text: &str) -> Result<(), CallScopeError> {
        self.page().gather_element()?;
        self.stage_input(GatherInput::Speech(text.to_string()))
    }

    /// Notify the partial result callback. The call does not advance.
    fn speak_partially(&self, stable: &str, unstable: &str) -> Result<HttpResponse, CallScopeError> {
        self.speak_partially_with(stable, unstable, &AdvanceOptions::default())
    }

    fn speak_partially_with(
        &self,
        stable: &str,
        unstable: &str,
        options: &AdvanceOptions,
    ) -> Result<HttpResponse, CallScopeError> {
        self.root_call()
            .send_partial_result(self.page(), stable, unstable, options)
    }

    fn within_gather<T, F>(&mut self, f: F) -> Result<T, CallScopeError>
    where
        Self: Sized,
        F: FnOnce(&mut CallScope<'_>) -> Result<T, CallScopeError>,
    {
        self.within_gather_with(&AdvanceOptions::default(), f)
    }

    /// Run `f` inside the first `<Gather>`. Input pressed or spoken there is
    /// submitted when `f` returns, and the answer replaces the current page.
    /// Nothing is submitted when `f` fails or gives no input.
    fn within_gather_with<T, F>(&mut self, options: &AdvanceOptions, f: F) -> Result<T, CallScopeError>
    where
        Self: Sized,
        F: FnOnce(&mut CallScope<'_>) -> Result<T, CallScopeError>,
    {
        let gather_page = self.page().descend(ElementKind::Gather)?;
        let (output, input) = {
            let mut gather = CallScope::nested(self.root_call(), gather_page.clone());
            let output = f(&mut gather)?;
            (output, gather.pending)
        };
        if let Some(input) = input {
            let next = self.root_call().gather_page(&gather_page, &input, options)?;
            self.set_page(next);
        }
        Ok(output)
    }

    // --- read-only descent ---

    fn within_element<T, F>(&self, kind: ElementKind, f: F) -> Result<T, CallScopeError>
    where
        Self: Sized,
        F: FnOnce(&CallScope<'_>) -> Result<T, CallScopeError>,
    {
        let page = self.page().descend(kind)?;
        let scope = CallScope::nested(self.root_call(), page);
        f(&scope)
    }

    fn within_dial<T, F>(&self, f: F) -> Result<T, CallScopeError>
    where
        Self: Sized,
        F: FnOnce(&CallScope<'_>) -> Result<T, CallScopeError>,
    {
        self.within_element(ElementKind::Dial, f)
    }

    fn within_sip<T, F>(&self, f: F) -> Result<T, CallScopeError>
    where
        Self: Sized,
        F: FnOnce(&CallScope<'_>) -> Result<T, CallScopeError>,
    {
        self.within_element(ElementKind::Sip, f)
    }
}

impl CallFlow for CallSession {
    fn root_call(&self) -> &CallSession {
        self
    }

    fn page(&self) -> &Page {
        &self.page
    }
}

impl<'r> CallFlow for CallScope<'r> {
    fn root_call(&self) -> &CallSession {
        self.root
    }

    fn page(&self) -> &Page {
        &self.page
    }
}
