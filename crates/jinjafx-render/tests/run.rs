//! Full runs: data loading, template functions, options and errors.

use jinjafx_render::jinjafx_data::DataError;
use jinjafx_render::{FxError, JinjaFx, RunOptions, Vars};

// ============================================================================
// Test helpers
// ============================================================================

fn stdout(template: &str, data: Option<&str>, vars: &Vars) -> String {
    JinjaFx::new(template)
        .run(data, vars)
        .unwrap()
        .outputs
        .text("_stdout_")
        .unwrap_or_default()
}

// ============================================================================
// Data and template functions
// ============================================================================

#[test]
fn fabric_configuration() {
    let data = "\
# spine/leaf fabric
device, peer, [vlans:int], loopback
spine(1|2), leaf\\0, 10;20, 10.0.0.{1:1}
";
    let template = "\
{{ device }} -> {{ peer }} lo={{ loopback }} vlans={{ vlans | join(',') }} ({{ jinjafx.row }}/{{ jinjafx.rows }})
";
    assert_eq!(
        stdout(template, Some(data), &Vars::new()),
        "spine1 -> leaf1 lo=10.0.0.1 vlans=10,20 (1/2)\nspine2 -> leaf2 lo=10.0.0.2 vlans=10,20 (2/2)\n"
    );
}

#[test]
fn typed_values_support_arithmetic() {
    let out = stdout("{{ vlan + 1000 }} {{ weight * 2 }}\n", Some("vlan:int, weight:float\n5, 1.5\n"), &Vars::new());
    assert_eq!(out, "1005 3.0\n");
}

#[test]
fn group_headers_with_first() {
    let data = "site, host\nlon, sw1\nlon, sw2\npar, sw3\n";
    let template = "\
{% if jinjafx.first(['site']) %}
[{{ site }}]
{% endif %}
{{ host }}
";
    assert_eq!(
        stdout(template, Some(data), &Vars::new()),
        "[lon]\nsw1\nsw2\n[par]\nsw3\n"
    );
}

#[test]
fn setg_and_getg_carry_values_between_rows() {
    let template = "\
{{ jinjafx.getg('prev', 'none') }}>{{ n }}
{{ jinjafx.setg('prev', n) }}";
    assert_eq!(
        stdout(template, Some("n\n(a|b|c)\n"), &Vars::new()),
        "none>a\na>b\nb>c\n"
    );
}

#[test]
fn vars_from_yaml_and_lookup() {
    let vars = Vars::from_yaml("domain: example.net\n").unwrap();
    let out = stdout(
        "{{ host }}.{{ domain }} {{ jinjafx.lookup('vars', 'domain') }}\n",
        Some("host\nsw1\n"),
        &vars,
    );
    assert_eq!(out, "sw1.example.net example.net\n");
}

#[test]
fn filter_and_sort_from_vars() {
    let vars = Vars::from_yaml("jinjafx_filter:\n  site: '^(lon|par)$'\njinjafx_sort: ['-host']\n").unwrap();
    let out = stdout(
        "{{ host }}\n",
        Some("site, host\nlon, sw1\nnyc, sw2\npar, sw3\n"),
        &vars,
    );
    assert_eq!(out, "sw3\nsw1\n");
}

#[test]
fn warnings_are_returned_once() {
    let run = JinjaFx::new("{{ jinjafx.warning('legacy vlan ' ~ vlan) }}{{ vlan }}\n")
        .run(Some("vlan\n1\n1\n2\n"), &Vars::new())
        .unwrap();
    assert_eq!(run.warnings, vec!["legacy vlan 1", "legacy vlan 2"]);
}

#[test]
fn tabulate_the_data() {
    let out = stdout(
        "{% if jinjafx.first() %}{{ jinjafx.tabulate() }}{% endif %}\n",
        Some("host, vlan:int\nsw1, 10\nsw22, 200\n"),
        &Vars::new(),
    );
    assert_eq!(
        out,
        "| host | vlan |\n|:-----|-----:|\n| sw1  |   10 |\n| sw22 |  200 |\n"
    );
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn exception_aborts_without_row_context() {
    let err = JinjaFx::new("{% if vlan > 4094 %}{{ jinjafx.exception('vlan out of range') }}{% endif %}")
        .run(Some("vlan:int\n10\n5000\n"), &Vars::new())
        .unwrap_err();
    assert!(matches!(&err, FxError::Raised(m) if m == "vlan out of range"));
    assert!(err.row().is_none());
}

#[test]
fn undefined_variable_reports_the_row() {
    let err = JinjaFx::new("{{ hots }}")
        .run(Some("host\nsw1\n"), &Vars::new())
        .unwrap_err();
    assert!(matches!(err, FxError::Render { .. }));
    assert_eq!(err.row().unwrap(), &serde_json::json!({"host": "sw1"}));
}

#[test]
fn duplicate_header_is_rejected() {
    let err = JinjaFx::new("x").run(Some("a, a\n1, 2\n"), &Vars::new()).unwrap_err();
    assert!(matches!(err, FxError::Data(DataError::DuplicateHeader(_))));
}

#[test]
fn header_without_rows_is_no_data() {
    let err = JinjaFx::new("x").run(Some("a, b\n"), &Vars::new()).unwrap_err();
    assert!(matches!(err, FxError::Data(DataError::NoData)));
}

#[test]
fn filter_on_unknown_field_is_an_error() {
    let options = RunOptions {
        filter: [("rack".to_string(), ".".to_string())].into(),
        ..RunOptions::default()
    };
    let err = JinjaFx::with_options("x", options)
        .run(Some("host\nsw1\n"), &Vars::new())
        .unwrap_err();
    assert!(matches!(err, FxError::Data(DataError::UnknownFilterField(_))));
}

#[test]
fn sandbox_budget_covers_data_and_template() {
    let options = RunOptions {
        budget: Some(4),
        ..RunOptions::default()
    };
    let fx = JinjaFx::with_options("{{ jinjafx.expand('[a-c]') | join }}", options);

    assert!(fx.run(None, &Vars::new()).is_ok());

    let err = fx.run(Some("n\n(1|2)\n"), &Vars::new()).unwrap_err();
    assert!(matches!(err, FxError::Data(DataError::Overflow { limit: 4 })));
}

#[test]
fn template_syntax_error() {
    let err = JinjaFx::new("{% for %}").run(None, &Vars::new()).unwrap_err();
    assert!(matches!(err, FxError::Template(_)));
}
