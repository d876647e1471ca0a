//! CLI command implementations
//!
//! Commands compute a JSON value and `run_command` writes it to stdout as
//! the single response object. Nothing here touches a store: `compose`
//! only shows the statements a configuration produces.

use std::path::Path;

use serde::Serialize;
use serde_json::{json, Value};

use crate::compose::naming::check_identifier;
use crate::compose::predicate::query_parameters;
use crate::compose::{BindStyle, RecordShape, Statement, StatementComposer, StatementKind};
use crate::config::EngineConfig;
use crate::observability::{log_event, Event, Logger, Severity};
use crate::value::SqlValue;

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::write_response;

/// What `compose` should show
#[derive(Debug, Clone, PartialEq)]
pub struct ComposeRequest {
    pub entity: String,
    pub fields: Vec<String>,
    pub keys: Vec<String>,
    pub combine: bool,
    pub style: BindStyle,
}

#[derive(Debug, Serialize)]
struct ComposedStatement {
    name: &'static str,
    kind: StatementKind,
    sql: String,
    params: Vec<String>,
}

impl ComposedStatement {
    fn new(name: &'static str, statement: &Statement) -> Self {
        Self {
            name,
            kind: statement.kind,
            sql: statement.sql(),
            params: statement.params().iter().map(|(n, _)| n.to_string()).collect(),
        }
    }
}

/// Main CLI entry point
///
/// Parses arguments, applies the log level and dispatches.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    let severity = Severity::parse(&cli.log_level)
        .ok_or_else(|| CliError::invalid_argument(format!("unknown log level '{}'", cli.log_level)))?;
    Logger::set_min_severity(severity);
    run_command(cli.command)
}

/// Run one command and write its response
pub fn run_command(cmd: Command) -> CliResult<()> {
    let response = match cmd {
        Command::Compose {
            config,
            entity,
            fields,
            keys,
            combine,
            inline,
        } => {
            let config = load_config(config.as_deref())?;
            let request = ComposeRequest {
                entity,
                fields,
                keys,
                combine,
                style: if inline {
                    BindStyle::InlineLiterals
                } else {
                    BindStyle::Parameters
                },
            };
            compose(&config, &request)?
        }
        Command::CheckConfig { config } => check_config(&config)?,
    };
    write_response(response)
}

/// Load a configuration file, or the built-in defaults without one
pub fn load_config(path: Option<&Path>) -> CliResult<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let display = path.display().to_string();

    match EngineConfig::load(path) {
        Ok(config) => {
            log_event(
                Event::ConfigLoaded,
                &[("path", &display), ("entities", &config.entities.len().to_string())],
            );
            Ok(config)
        }
        Err(e) => {
            log_event(Event::ConfigRejected, &[("path", &display), ("code", e.code())]);
            Err(e.into())
        }
    }
}

/// Validate a configuration file and summarize it
pub fn check_config(path: &Path) -> CliResult<Value> {
    let config = load_config(Some(path))?;
    let mut entities: Vec<&String> = config.entities.keys().collect();
    entities.sort();

    Ok(json!({
        "path": path.display().to_string(),
        "entities": entities,
        "default": config.default,
    }))
}

/// Statements the configuration composes for one record shape
pub fn compose(config: &EngineConfig, request: &ComposeRequest) -> CliResult<Value> {
    if request.fields.is_empty() {
        return Err(CliError::invalid_argument("no fields given"));
    }
    for field in &request.fields {
        check_identifier(field)?;
    }

    let table = config.table_for(&request.entity);
    table.validate(&request.entity)?;

    let shape = RecordShape::new(request.entity.clone(), request.fields.iter().cloned());
    let composer = StatementComposer::new(table, &shape, request.style);

    let keys = composer.keys(&request.keys, true);
    shape.check_fields(&keys)?;

    let values: Vec<(String, SqlValue)> = shape
        .fields
        .iter()
        .map(|f| (f.clone(), SqlValue::Null))
        .collect();
    let samples: Vec<SqlValue> = keys.iter().map(|k| SqlValue::Text(format!("<{}>", k))).collect();

    let mut binder = composer.binder();
    let predicate = query_parameters(&samples, &keys, request.combine, &mut binder)?;
    let lookup = binder.finish(predicate);

    let mut statements = vec![
        ComposedStatement::new("select", &composer.select(None, false)?),
        ComposedStatement::new("select_all", &composer.select(None, true)?),
        ComposedStatement::new("find", &composer.select_top1(Some(lookup.clone()), false, false)?),
        ComposedStatement::new("exists", &composer.count(Some(lookup), true)?),
        ComposedStatement::new("insert", &composer.insert::<&str>(&values, &[])?),
        ComposedStatement::new("update", &composer.update(&values, &request.keys, request.combine)?),
        ComposedStatement::new("delete", &composer.delete(&values, &request.keys, request.combine)?),
        ComposedStatement::new("current_identity", &composer.current_identity()?),
    ];

    let mirror = composer.history_mirror();
    if let Some(history) = mirror.mirror(&values, true)? {
        statements.push(ComposedStatement::new("history_on_create", &history));
    }
    if let Some(history) = mirror.mirror(&values, false)? {
        statements.push(ComposedStatement::new("history", &history));
    }

    log_event(
        Event::StatementsComposed,
        &[
            ("entity", &request.entity),
            ("statements", &statements.len().to_string()),
        ],
    );

    Ok(json!({
        "entity": request.entity,
        "table": composer.table(false)?,
        "identity_mode": table.identity_mode,
        "bind_style": request.style,
        "statements": statements,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IdentityMode, TableConfig};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn request(style: BindStyle) -> ComposeRequest {
        ComposeRequest {
            entity: "PersonDTO".to_string(),
            fields: vec!["id".to_string(), "name".to_string(), "date".to_string()],
            keys: vec![],
            combine: false,
            style,
        }
    }

    fn statement<'a>(response: &'a Value, name: &str) -> &'a Value {
        response["statements"]
            .as_array()
            .unwrap()
            .iter()
            .find(|s| s["name"] == name)
            .unwrap()
    }

    #[test]
    fn test_compose_with_defaults() {
        let response = compose(&EngineConfig::default(), &request(BindStyle::Parameters)).unwrap();

        assert_eq!(response["table"], "dbo.[Person]");
        assert_eq!(response["identity_mode"], "no_history");
        assert_eq!(
            statement(&response, "find")["sql"],
            "select top 1 [id],[name],[date] from dbo.[Person] where active = 1 and (id = @__p0)"
        );
        assert_eq!(statement(&response, "find")["params"], json!(["__p0"]));
        assert_eq!(
            statement(&response, "update")["sql"],
            "update dbo.[Person] set [name] = @name,[date] = @date where (id = @id)"
        );
        assert_eq!(statement(&response, "delete")["kind"], "delete");
        assert!(response["statements"]
            .as_array()
            .unwrap()
            .iter()
            .all(|s| s["name"] != "history"));
    }

    #[test]
    fn test_compose_inline_with_history() {
        let mut config = EngineConfig::default();
        config.entities.insert(
            "PersonDTO".to_string(),
            TableConfig::with_identity_mode(IdentityMode::IntegerIdentity),
        );

        let response = compose(&config, &request(BindStyle::InlineLiterals)).unwrap();
        assert_eq!(
            statement(&response, "exists")["sql"],
            "select count(1) from dbo.[Person] where (id = '<id>')"
        );
        assert_eq!(
            statement(&response, "history_on_create")["sql"],
            "insert into dbo.[PersonHist] ([id],[name],[date]) values (@@IDENTITY,@name,@date)"
        );
        assert_eq!(
            statement(&response, "insert")["sql"],
            "insert into dbo.[Person] ([name],[date]) values (@name,@date)"
        );
    }

    #[test]
    fn test_compose_rejects_bad_identifiers() {
        let mut bad = request(BindStyle::Parameters);
        bad.fields.push("name; drop table x".to_string());
        assert_eq!(
            compose(&EngineConfig::default(), &bad).unwrap_err().code(),
            "ROWKEEPER_CLI_COMPOSE_ERROR"
        );

        let mut unknown_key = request(BindStyle::Parameters);
        unknown_key.keys = vec!["email".to_string()];
        assert!(compose(&EngineConfig::default(), &unknown_key).is_err());
    }

    #[test]
    fn test_check_config() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"entities": {{"Tag": {{"identity_mode": "integer_identity"}}, "Person": {{}}}}}}"#
        )
        .unwrap();

        let summary = check_config(file.path()).unwrap();
        assert_eq!(summary["entities"], json!(["Person", "Tag"]));
        assert_eq!(summary["default"]["prefix"], "dbo.");
    }

    #[test]
    fn test_check_config_rejects_invalid() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"default": {{"id_field": "bad field"}}}}"#).unwrap();

        let err = check_config(file.path()).unwrap_err();
        assert_eq!(err.code(), "ROWKEEPER_CLI_CONFIG_ERROR");
    }
}
