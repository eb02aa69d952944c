use indexmap::IndexMap;
use runbook_engine::{
    ExecutionOptions, LogFormat, LogQuery, ReversibilityPolicy, RunMetadata, SimulatedRunner, TemplateExecution, execute_template,
    generate_revert_for_execution, load_one, parse_statement, parse_template, run_log_query, save_execution, stats,
};
use runbook_types::{Literal, Node, TemplateError};
use runbook_util::{DirectoryTemplateStore, TemplateStore};
use tempfile::tempdir;

const WEB_STACK: &str = include_str!("data/web_stack.runbook");

fn fillers() -> IndexMap<String, Literal> {
    let mut fillers = IndexMap::new();
    fillers.insert("vpc.name".to_string(), Literal::from("prod"));
    fillers
}

fn simulated_run(fillers: IndexMap<String, Literal>) -> TemplateExecution {
    let ast = parse_template(WEB_STACK).expect("parse fixture");
    let metadata = RunMetadata {
        author: "ops".into(),
        source: WEB_STACK.into(),
        locale: "eu-west-1".into(),
        profile: "staging".into(),
    };
    let mut execution = TemplateExecution::start(ast, metadata).with_fillers(fillers);
    execute_template(
        &mut execution.template.ast,
        &execution.fillers,
        &SimulatedRunner::new(),
        ExecutionOptions::default(),
    );
    execution
}

#[test]
fn fixture_statements_round_trip_through_canonical_text() {
    let ast = parse_template(WEB_STACK).expect("parse fixture");
    assert_eq!(ast.command_count(), 5);
    for command in ast.command_nodes() {
        let rendered = command.to_string();
        match parse_statement(&rendered).expect("reparse canonical text") {
            Node::Command(reparsed) => assert_eq!(&reparsed, command, "rendered: {rendered}"),
            Node::Declaration(_) => panic!("bare command reparsed as declaration: {rendered}"),
        }
    }
    assert_eq!(parse_template(&ast.to_string()).expect("reparse template"), ast);
}

#[test]
fn stats_count_every_command() {
    let ast = parse_template("create vpc cidr=10.0.0.0/16\ndelete vpc id=vpc-1\ncreate vpc cidr=10.1.0.0/16\n").expect("parse");
    let counts = stats(&ast);
    assert_eq!(counts.len(), 2);
    assert_eq!(counts["create vpc"], 2);
    assert_eq!(counts["delete vpc"], 1);
}

#[test]
fn stored_execution_reverts_like_live_execution() {
    let dir = tempdir().expect("tempdir");
    let store = DirectoryTemplateStore::new(Some(dir.path().to_path_buf()));
    let execution = simulated_run(fillers());
    assert_eq!(execution.tally().failed, 0);

    save_execution(&store, &execution).expect("save");
    let reloaded = load_one(&store, execution.id()).expect("reload");
    assert_eq!(reloaded.stats(), execution.stats());
    assert_eq!(reloaded.template.ast.statements.len(), 5);
    assert!(
        reloaded
            .template
            .ast
            .statements
            .iter()
            .all(|statement| statement.declared_identifier().is_none())
    );

    let policy = ReversibilityPolicy::default();
    let live = generate_revert_for_execution(&execution, &policy).expect("revert live");
    let stored = generate_revert_for_execution(&reloaded, &policy).expect("revert stored");

    let expected = "stop instance id=instance-sim-0003\n\
                    detach volume instance=instance-sim-0003 id=vol-1 device=/dev/sdh\n\
                    delete instance id=instance-sim-0003\n\
                    delete subnet id=subnet-sim-0002\n\
                    delete vpc id=vpc-sim-0001\n";
    assert_eq!(live.ast.to_string(), expected);
    assert_eq!(stored.ast, live.ast);
    assert_ne!(live.id, stored.id);
}

#[test]
fn missing_filler_fails_dependent_commands() {
    let execution = simulated_run(IndexMap::new());
    let tally = execution.tally();
    assert_eq!(tally.succeeded, 0);
    assert_eq!(tally.failed, 5);

    let first_error = execution.template.ast.command_nodes().next().and_then(|command| command.error.clone());
    assert_eq!(first_error, Some(TemplateError::MissingInput { hole: "vpc.name".into() }.to_string()));

    let revert = generate_revert_for_execution(&execution, &ReversibilityPolicy::default()).expect("revert");
    assert_eq!(revert.ast.command_count(), 0);
}

#[test]
fn listing_survives_corrupt_records_on_disk() {
    let dir = tempdir().expect("tempdir");
    let store = DirectoryTemplateStore::new(Some(dir.path().to_path_buf()));
    let first = simulated_run(fillers());
    save_execution(&store, &first).expect("save first");

    let corrupt_key = runbook_engine::ExecutionId::new().to_string();
    store.put(&corrupt_key, b"{\"id\": 42}".to_vec()).expect("put corrupt");

    let second = simulated_run(fillers());
    save_execution(&store, &second).expect("save second");

    let mut out = Vec::new();
    let query = LogQuery {
        format: LogFormat::Short,
        ..LogQuery::default()
    };
    run_log_query(&store, &query, &mut out).expect("listing");
    let output = String::from_utf8(out).expect("utf8");
    let lines: Vec<&str> = output.lines().collect();

    assert_eq!(lines.len(), 3, "output: {output}");
    assert!(lines[0].starts_with(&format!("{} OK - 5 commands (", first.id())), "{}", lines[0]);
    assert!(lines[0].ends_with("<staging:ops> [eu-west-1]"), "{}", lines[0]);
    assert!(lines[1].starts_with(&format!("Template '{corrupt_key}' in error: ")), "{}", lines[1]);
    assert!(lines[2].starts_with(second.id()), "{}", lines[2]);
}

#[test]
fn record_dates_follow_allocation_order() {
    let first = simulated_run(fillers());
    let second = simulated_run(fillers());
    assert!(first.id() < second.id());
    assert!(first.date().expect("first date") <= second.date().expect("second date"));
}
