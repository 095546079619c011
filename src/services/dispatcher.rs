//! Request routing and validation for the LED control protocol.
//!
//! The dispatcher is transport neutral: it takes a method, a path and the
//! decoded arguments and produces a status with a plain-text body. Validation
//! failures are answered with status 200 and an `error: ...` body; only
//! unknown routes produce 404.

use super::{
    command_table::{Brightness, Category, Color, Command, CommandTable, Function, Power},
    documentation,
    state_cache::RequestedState,
};
use crate::device::DeviceCommandSink;
use actix_web::http::{Method, StatusCode};
use log::{debug, info};
use std::fmt::Write;
use thiserror::Error;

const SUCCESS: &str = "success";
const DOCUMENTATION_ARG: &str = "documentation";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchRequest {
    pub method: Method,
    pub path: String,
    /// Name/value pairs in the order they were received.
    pub args: Vec<(String, String)>,
}

impl DispatchRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            args: Vec::new(),
        }
    }

    pub fn with_arg(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.push((name.into(), value.into()));
        self
    }

    /// First value supplied for `name`.
    pub fn arg(&self, name: &str) -> Option<&str> {
        self.args
            .iter()
            .find(|(arg_name, _)| arg_name == name)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchResponse {
    pub status: StatusCode,
    pub body: String,
}

impl DispatchResponse {
    fn ok(body: String) -> Self {
        Self {
            status: StatusCode::OK,
            body,
        }
    }

    fn not_found(request: &DispatchRequest) -> Self {
        let mut body = format!(
            "404: Not Found\n\nURI: {}\nMethod: {}\nArguments: {}\n",
            request.path,
            request.method,
            request.args.len()
        );
        for (name, value) in &request.args {
            let _ = writeln!(body, " {name}: {value}");
        }

        Self {
            status: StatusCode::NOT_FOUND,
            body,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("argument expected")]
    MissingArgument { name: &'static str },
    #[error("argument does not match expected")]
    InvalidArgumentValue { name: &'static str, value: String },
    #[error("invalid argument type")]
    InvalidArgumentType { value: String },
    #[error("route not found")]
    RouteNotFound { method: Method, path: String },
}

/// Routes requests to category handlers and owns the requested state of one
/// service run.
pub struct Dispatcher<Sink>
where
    Sink: DeviceCommandSink,
{
    state: RequestedState,
    sink: Sink,
}

impl<Sink> Dispatcher<Sink>
where
    Sink: DeviceCommandSink,
{
    pub fn new(sink: Sink) -> Self {
        Self {
            state: RequestedState::default(),
            sink,
        }
    }

    pub fn state(&self) -> &RequestedState {
        &self.state
    }

    pub fn dispatch(&mut self, request: &DispatchRequest) -> DispatchResponse {
        debug!("dispatch() called: {} {}", request.method, request.path);

        let body = match self.route(request) {
            Ok(body) => body,
            Err(DispatchError::RouteNotFound { method, path }) => {
                debug!("no route for {method} {path}");
                return DispatchResponse::not_found(request);
            }
            Err(e) => {
                debug!("{} {} rejected: {e:?}", request.method, request.path);
                format!("error: {e}")
            }
        };

        self.state.visit(&request.path);

        DispatchResponse::ok(body)
    }

    fn route(&mut self, request: &DispatchRequest) -> Result<String, DispatchError> {
        let method = &request.method;

        match request.path.as_str() {
            "/" | "/routes" if method == Method::GET => Ok(documentation::service_description()),
            "/cached-state" if method == Method::GET => Ok(self.state.dump()),
            path => match Category::from_path(path) {
                Some(category) if method == Method::POST => self.apply(category, request),
                Some(category) if method == Method::GET => Ok(self.report(category, request)),
                _ => Err(DispatchError::RouteNotFound {
                    method: method.clone(),
                    path: request.path.clone(),
                }),
            },
        }
    }

    fn apply(
        &mut self,
        category: Category,
        request: &DispatchRequest,
    ) -> Result<String, DispatchError> {
        let name = category.name();
        let value = request
            .arg(name)
            .filter(|value| !value.is_empty())
            .ok_or(DispatchError::MissingArgument { name })?;

        let code = match category {
            Category::Raw => {
                let code = parse_byte(value)?;
                self.state.record_raw(code);
                code
            }
            Category::Brightness => self.record(parse_token::<Brightness>(value)?),
            Category::Power => self.record(parse_token::<Power>(value)?),
            Category::Function => self.record(parse_token::<Function>(value)?),
            Category::Color => self.record(parse_token::<Color>(value)?),
        };

        info!("{name}={value} accepted, transmit 0x{code:02X}");
        self.sink.send(code);

        Ok(SUCCESS.to_string())
    }

    fn report(&self, category: Category, request: &DispatchRequest) -> String {
        if request.arg(DOCUMENTATION_ARG) == Some("true") {
            documentation::usage(category)
        } else {
            format!("{category}: {}", self.state.value(category))
        }
    }

    fn record(&mut self, command: impl Into<Command>) -> u8 {
        let command = command.into();
        self.state.record(command);
        command.code()
    }
}

fn parse_token<T: CommandTable>(value: &str) -> Result<T, DispatchError> {
    T::from_token(value).ok_or_else(|| DispatchError::InvalidArgumentValue {
        name: T::CATEGORY.name(),
        value: value.to_string(),
    })
}

fn parse_byte(value: &str) -> Result<u8, DispatchError> {
    value
        .parse::<u8>()
        .map_err(|_| DispatchError::InvalidArgumentType {
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MockDeviceCommandSink;
    use mockall::predicate::eq;

    fn silent_dispatcher() -> Dispatcher<MockDeviceCommandSink> {
        let mut sink = MockDeviceCommandSink::new();
        sink.expect_send().never();
        Dispatcher::new(sink)
    }

    fn dispatcher_expecting(code: u8) -> Dispatcher<MockDeviceCommandSink> {
        let mut sink = MockDeviceCommandSink::new();
        sink.expect_send().with(eq(code)).times(1).return_const(());
        Dispatcher::new(sink)
    }

    fn post(path: &str, name: &str, value: &str) -> DispatchRequest {
        DispatchRequest::new(Method::POST, path).with_arg(name, value)
    }

    fn get(path: &str) -> DispatchRequest {
        DispatchRequest::new(Method::GET, path)
    }

    #[test]
    fn every_valid_token_is_accepted_and_reported() {
        for command in Command::by_code() {
            let category = command.category();
            let path = format!("/{category}");
            let mut dispatcher = dispatcher_expecting(command.code());

            let response = dispatcher.dispatch(&post(&path, category.name(), command.token()));
            assert_eq!(response.status, StatusCode::OK);
            assert_eq!(response.body, "success");

            let response = dispatcher.dispatch(&get(&path));
            assert_eq!(response.body, format!("{category}: {}", command.token()));

            let dump = dispatcher.dispatch(&get("/cached-state")).body;
            assert!(dump.contains(&format!("\t{category}: {}\n", command.token())));
            assert_eq!(dispatcher.state().raw, Some(command.code()));
        }
    }

    #[test]
    fn unknown_token_leaves_state_unchanged() {
        for category in [
            Category::Brightness,
            Category::Power,
            Category::Function,
            Category::Color,
        ] {
            let mut dispatcher = silent_dispatcher();

            let response =
                dispatcher.dispatch(&post(&format!("/{category}"), category.name(), "Blue"));

            assert_eq!(response.status, StatusCode::OK);
            assert_eq!(response.body, "error: argument does not match expected");
            assert_eq!(
                dispatcher.state(),
                &RequestedState {
                    last_path: Some(format!("/{category}")),
                    ..Default::default()
                }
            );
        }
    }

    #[test]
    fn missing_or_empty_argument_is_rejected() {
        for category in Category::ALL {
            let path = format!("/{category}");
            let mut dispatcher = silent_dispatcher();

            let missing = dispatcher.dispatch(&DispatchRequest::new(Method::POST, &path));
            let empty = dispatcher.dispatch(&post(&path, category.name(), ""));
            let other_name = dispatcher.dispatch(&post(&path, "value", "on"));

            for response in [missing, empty, other_name] {
                assert_eq!(response.status, StatusCode::OK);
                assert_eq!(response.body, "error: argument expected");
            }
            assert_eq!(dispatcher.state().raw, None);
        }
    }

    #[test]
    fn raw_accepts_bytes_only() {
        let mut dispatcher = silent_dispatcher();
        for value in ["300", "256", "-1", "abc", "7.0", " 7"] {
            let response = dispatcher.dispatch(&post("/raw", "raw", value));
            assert_eq!(response.body, "error: invalid argument type", "value {value:?}");
        }
        assert_eq!(dispatcher.state().raw, None);

        let mut dispatcher = dispatcher_expecting(7);
        let response = dispatcher.dispatch(&post("/raw", "raw", "7"));
        assert_eq!(response.body, "success");
        assert_eq!(dispatcher.state().raw, Some(7));
        assert_eq!(dispatcher.dispatch(&get("/raw")).body, "raw: 7");
    }

    #[test]
    fn raw_bounds_are_inclusive() {
        let mut sink = MockDeviceCommandSink::new();
        sink.expect_send().with(eq(0)).times(1).return_const(());
        sink.expect_send().with(eq(255)).times(1).return_const(());
        let mut dispatcher = Dispatcher::new(sink);

        assert_eq!(dispatcher.dispatch(&post("/raw", "raw", "0")).body, "success");
        assert_eq!(dispatcher.dispatch(&post("/raw", "raw", "255")).body, "success");
        assert_eq!(dispatcher.state().raw, Some(255));
    }

    #[test]
    fn raw_does_not_touch_category_fields() {
        let mut dispatcher = dispatcher_expecting(0x07);

        dispatcher.dispatch(&post("/raw", "raw", "7"));

        assert_eq!(dispatcher.state().power, None);
        assert_eq!(dispatcher.dispatch(&get("/power")).body, "power: unknown");
    }

    #[test]
    fn get_reports_unknown_before_any_command() {
        let mut dispatcher = silent_dispatcher();

        for category in Category::ALL {
            let response = dispatcher.dispatch(&get(&format!("/{category}")));
            assert_eq!(response.body, format!("{category}: unknown"));
        }
    }

    #[test]
    fn documentation_ignores_state_and_is_idempotent() {
        let mut dispatcher = dispatcher_expecting(0x07);
        let request = get("/power").with_arg("documentation", "true");

        let before = dispatcher.dispatch(&request).body;
        dispatcher.dispatch(&post("/power", "power", "on"));
        let after = dispatcher.dispatch(&request).body;

        assert_eq!(before, after);
        assert_eq!(before, documentation::usage(Category::Power));

        let not_requested = dispatcher.dispatch(&get("/power").with_arg("documentation", "false"));
        assert_eq!(not_requested.body, "power: on");
    }

    #[test]
    fn first_argument_wins() {
        let mut dispatcher = dispatcher_expecting(0x09);
        let request = DispatchRequest::new(Method::POST, "/color")
            .with_arg("extra", "ignored")
            .with_arg("color", "red")
            .with_arg("color", "blue");

        assert_eq!(dispatcher.dispatch(&request).body, "success");
        assert_eq!(dispatcher.state().color, Some(Color::Red));
    }

    #[test]
    fn unknown_route_echoes_request_without_visiting() {
        let mut dispatcher = silent_dispatcher();
        dispatcher.dispatch(&get("/routes"));

        let request = get("/unknown-path")
            .with_arg("color", "red")
            .with_arg("documentation", "true");
        let response = dispatcher.dispatch(&request);

        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(
            response.body,
            "404: Not Found\n\nURI: /unknown-path\nMethod: GET\nArguments: 2\n \
             color: red\n documentation: true\n"
        );
        assert_eq!(dispatcher.state().last_path.as_deref(), Some("/routes"));
    }

    #[test]
    fn service_routes_are_get_only() {
        let mut dispatcher = silent_dispatcher();

        assert_eq!(
            dispatcher.dispatch(&post("/", "power", "on")).status,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            dispatcher
                .dispatch(&DispatchRequest::new(Method::PUT, "/power"))
                .status,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            dispatcher
                .dispatch(&DispatchRequest::new(Method::POST, "/cached-state"))
                .status,
            StatusCode::NOT_FOUND
        );
        assert_eq!(dispatcher.state().last_path, None);
    }

    #[test]
    fn root_and_routes_serve_description() {
        let mut dispatcher = silent_dispatcher();

        let root = dispatcher.dispatch(&get("/"));
        let routes = dispatcher.dispatch(&get("/routes"));

        assert_eq!(root.body, documentation::service_description());
        assert_eq!(root, routes);
        assert_eq!(dispatcher.state().last_path.as_deref(), Some("/routes"));
    }

    #[test]
    fn cached_state_shows_previous_path() {
        let mut dispatcher = silent_dispatcher();

        let first = dispatcher.dispatch(&get("/cached-state")).body;
        dispatcher.dispatch(&get("/color"));
        let second = dispatcher.dispatch(&get("/cached-state")).body;
        let third = dispatcher.dispatch(&get("/cached-state")).body;

        assert!(first.ends_with("\turi: unknown\n"));
        assert!(second.ends_with("\turi: /color\n"));
        assert!(third.ends_with("\turi: /cached-state\n"));
    }

    #[test]
    fn validation_errors_still_visit_path() {
        let mut dispatcher = silent_dispatcher();

        dispatcher.dispatch(&post("/function", "function", "disco"));

        assert_eq!(dispatcher.state().last_path.as_deref(), Some("/function"));
    }
}
