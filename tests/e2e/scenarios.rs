use super::harness::{TestContext, parse_json};

pub struct Scenario {
    pub name: &'static str,
    pub run: fn(&TestContext) -> Result<(), String>,
}

pub fn scenarios() -> Vec<Scenario> {
    vec![
        Scenario {
            name: "help_output",
            run: scenario_help,
        },
        Scenario {
            name: "no_args_error",
            run: scenario_no_args,
        },
        Scenario {
            name: "python_range_text",
            run: scenario_python_range_text,
        },
        Scenario {
            name: "python_range_json",
            run: scenario_python_range_json,
        },
        Scenario {
            name: "python_range_invalid",
            run: scenario_python_range_invalid,
        },
        Scenario {
            name: "config_python_floor",
            run: scenario_config_python_floor,
        },
        Scenario {
            name: "config_invalid_support",
            run: scenario_config_invalid_support,
        },
        Scenario {
            name: "config_malformed",
            run: scenario_config_malformed,
        },
        Scenario {
            name: "requirement_json",
            run: scenario_requirement_json,
        },
        Scenario {
            name: "requirement_platform_selector",
            run: scenario_requirement_platform_selector,
        },
        Scenario {
            name: "requirement_extra",
            run: scenario_requirement_extra,
        },
        Scenario {
            name: "resolve_invalid_spec",
            run: scenario_resolve_invalid_spec,
        },
        Scenario {
            name: "resolve_unreachable_index",
            run: scenario_resolve_unreachable_index,
        },
    ]
}

fn scenario_help(ctx: &TestContext) -> Result<(), String> {
    let env = ctx.create_env("help")?;
    let output = ctx.run_metaforge(&env, &["--help"])?;
    output.assert_success()?;
    output.assert_stdout_contains("resolve")?;
    output.assert_stdout_contains("python-range")?;
    Ok(())
}

fn scenario_no_args(ctx: &TestContext) -> Result<(), String> {
    let env = ctx.create_env("no-args")?;
    let output = ctx.run_metaforge(&env, &[])?;
    output.assert_failure()?;
    output.assert_stderr_contains("No command specified")?;
    Ok(())
}

fn scenario_python_range_text(ctx: &TestContext) -> Result<(), String> {
    let env = ctx.create_env("python-range-text")?;
    let output = ctx.run_metaforge(&env, &["python-range", ">=3.7"])?;
    output.assert_success()?;
    output.assert_stdout_contains("skip: # [py<37]")?;
    output.assert_stdout_contains("limit: >=3.7")?;

    let output = ctx.run_metaforge(&env, &["python-range", ">=2.7"])?;
    output.assert_success()?;
    output.assert_stdout_contains("skip: none")?;
    output.assert_stdout_contains("limit: none")?;
    Ok(())
}

fn scenario_python_range_json(ctx: &TestContext) -> Result<(), String> {
    let env = ctx.create_env("python-range-json")?;
    let output = ctx.run_metaforge(&env, &["--json", "python-range", ">=2.7, !=3.6.*"])?;
    output.assert_success()?;
    let value = parse_json(&output.stdout)?;
    if value["skip"] != "py==36" || value["limit"] != "!=3.6" {
        return Err(format!("Unexpected translation: {}", value));
    }

    let output = ctx.run_metaforge(&env, &["python-range", "<3", "--json"])?;
    output.assert_success()?;
    let value = parse_json(&output.stdout)?;
    if value["skip"] != "py3k" || value["limit"] != "<3.0" {
        return Err(format!("Unexpected translation: {}", value));
    }
    Ok(())
}

fn scenario_python_range_invalid(ctx: &TestContext) -> Result<(), String> {
    let env = ctx.create_env("python-range-invalid")?;
    let output = ctx.run_metaforge(&env, &["python-range", "banana"])?;
    output.assert_failure()?;
    output.assert_stderr_contains("Error: Failed to parse 'banana'")?;
    Ok(())
}

fn scenario_config_python_floor(ctx: &TestContext) -> Result<(), String> {
    let env = ctx.create_env("config-floor")?;
    env.write_config(r#"{"python_floor": "3.8", "python_newest": "3.12"}"#)?;
    let output = ctx.run_metaforge(&env, &["python-range", ">=3.5"])?;
    output.assert_success()?;
    output.assert_stdout_contains("skip: # [py2k]")?;
    output.assert_stdout_contains("limit: >=3.8")?;
    Ok(())
}

fn scenario_config_invalid_support(ctx: &TestContext) -> Result<(), String> {
    let env = ctx.create_env("config-invalid")?;
    env.write_config(r#"{"python_floor": "3.10", "python_newest": "3.8"}"#)?;
    let output = ctx.run_metaforge(&env, &["python-range", ">=3.7"])?;
    output.assert_failure()?;
    output.assert_stderr_contains("Invalid configuration")?;
    Ok(())
}

fn scenario_config_malformed(ctx: &TestContext) -> Result<(), String> {
    let env = ctx.create_env("config-malformed")?;
    env.write_config("{ not json")?;
    let output = ctx.run_metaforge(&env, &["python-range", ">=3.7"])?;
    output.assert_failure()?;
    output.assert_stderr_contains("Failed to parse config file")?;
    Ok(())
}

fn scenario_requirement_json(ctx: &TestContext) -> Result<(), String> {
    let env = ctx.create_env("requirement-json")?;
    let output = ctx.run_metaforge(
        &env,
        &[
            "--json",
            "requirement",
            r#"pathlib2 (>=2.2.0) ; python_version < "3.6""#,
        ],
    )?;
    output.assert_success()?;
    let value = parse_json(&output.stdout)?;
    if value["name"] != "pathlib2" || value["version"] != ">=2.2.0" {
        return Err(format!("Unexpected requirement: {}", value));
    }
    if value["selector"] != "py<36" {
        return Err(format!("Unexpected selector: {}", value["selector"]));
    }
    Ok(())
}

fn scenario_requirement_platform_selector(ctx: &TestContext) -> Result<(), String> {
    let env = ctx.create_env("requirement-platform")?;
    let output = ctx.run_metaforge(
        &env,
        &["requirement", r#"colorama ; sys_platform == "win32""#],
    )?;
    output.assert_success()?;
    output.assert_stdout_contains("name: colorama")?;
    output.assert_stdout_contains("selector: # [win]")?;
    Ok(())
}

fn scenario_requirement_extra(ctx: &TestContext) -> Result<(), String> {
    let env = ctx.create_env("requirement-extra")?;
    let output = ctx.run_metaforge(
        &env,
        &["requirement", r#"argcomplete ; extra == "testing""#],
    )?;
    output.assert_success()?;
    output.assert_stdout_contains("extra: true")?;
    Ok(())
}

fn scenario_resolve_invalid_spec(ctx: &TestContext) -> Result<(), String> {
    let env = ctx.create_env("resolve-invalid-spec")?;
    let output = ctx.run_metaforge(&env, &["resolve", "pytest>=5"])?;
    output.assert_failure()?;
    output.assert_stderr_contains("Invalid package name")?;
    Ok(())
}

fn scenario_resolve_unreachable_index(ctx: &TestContext) -> Result<(), String> {
    let env = ctx.create_env("resolve-unreachable")?;
    let output = ctx.run_metaforge(
        &env,
        &[
            "resolve",
            "pytest",
            "--no-sdist",
            "--index-url",
            "http://127.0.0.1:9/pypi",
        ],
    )?;
    output.assert_failure()?;
    output.assert_stderr_contains("Error: Failed to fetch package info from PyPI")?;
    Ok(())
}
