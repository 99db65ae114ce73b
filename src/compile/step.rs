// src/compile/step.rs

//! Step compiler: one declarative `Step` in, one code fragment out.
//!
//! Pure and infallible. Resolution into a [`StepKind`] validates the
//! parameters an action needs; anything that does not resolve degrades to a
//! placeholder fragment that announces the step and does nothing else.

use serde_json::Value;
use thiserror::Error;

use crate::compile::literal::{comment_text, file_component, quoted, quoted_list};
use crate::compile::PLOTS_DIR;
use crate::plan::{Action, Parameters, Step};

/// Image extension used for every saved plot.
pub const PLOT_EXT: &str = "png";

/// Input formats `LoadData` knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Tsv,
    Json,
    Excel,
    Parquet,
}

impl FileFormat {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().trim_start_matches('.').to_lowercase().as_str() {
            "csv" => Some(FileFormat::Csv),
            "tsv" => Some(FileFormat::Tsv),
            "json" => Some(FileFormat::Json),
            "xls" | "xlsx" | "excel" => Some(FileFormat::Excel),
            "parquet" => Some(FileFormat::Parquet),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlotKind {
    Histogram { column: String },
    Scatter { x: String, y: String },
}

/// A step whose action and parameters have been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepKind {
    LoadData { file_path: String, format: FileFormat },
    ComputeStatistics { columns: Vec<String> },
    CreatePlot(PlotKind),
    ComputeCorrelations { columns: Vec<String> },
    GenerateReport,
    Unrecognized { action: String },
}

/// Why a step compiled to a placeholder instead of its template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Degradation {
    #[error("unrecognized action '{0}'")]
    UnknownAction(String),

    #[error("action '{action}' is missing required parameter '{parameter}'")]
    MissingParameter {
        action: String,
        parameter: &'static str,
    },

    #[error("action '{action}' has invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        action: String,
        parameter: &'static str,
        reason: String,
    },
}

/// Output of the step compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeFragment {
    pub source: String,
    /// Set when the fragment is a placeholder.
    pub degradation: Option<Degradation>,
}

impl StepKind {
    pub fn resolve(step: &Step) -> Result<StepKind, Degradation> {
        let params = &step.parameters;
        let action = &step.action;

        let kind = match action {
            Action::LoadData => {
                let file_path = first_string(params, action, &["file_path", "path"])?
                    .ok_or_else(|| missing(action, "file_path"))?;
                let format = match string_param(params, action, "file_type")? {
                    None => FileFormat::Csv,
                    Some(raw) => FileFormat::parse(&raw).ok_or_else(|| {
                        invalid(action, "file_type", format!("unsupported file type '{raw}'"))
                    })?,
                };
                StepKind::LoadData { file_path, format }
            }
            Action::ComputeStatistics => StepKind::ComputeStatistics {
                columns: columns_param(params, action)?,
            },
            Action::CreatePlot => {
                let plot_type = string_param(params, action, "plot_type")?
                    .unwrap_or_else(|| "histogram".to_string());
                match plot_type.trim().to_lowercase().as_str() {
                    "histogram" | "hist" => {
                        let column = first_string(params, action, &["column", "x"])?
                            .ok_or_else(|| missing(action, "column"))?;
                        StepKind::CreatePlot(PlotKind::Histogram { column })
                    }
                    "scatter" => {
                        let x = string_param(params, action, "x")?
                            .ok_or_else(|| missing(action, "x"))?;
                        let y = string_param(params, action, "y")?
                            .ok_or_else(|| missing(action, "y"))?;
                        StepKind::CreatePlot(PlotKind::Scatter { x, y })
                    }
                    other => {
                        return Err(invalid(
                            action,
                            "plot_type",
                            format!("unsupported plot type '{other}'"),
                        ));
                    }
                }
            }
            Action::ComputeCorrelations => StepKind::ComputeCorrelations {
                columns: columns_param(params, action)?,
            },
            Action::GenerateReport => StepKind::GenerateReport,
            Action::Unrecognized(raw) => StepKind::Unrecognized {
                action: raw.clone(),
            },
        };

        Ok(kind)
    }
}

/// Compile one step into a code fragment. Never fails.
pub fn compile_step(step: &Step) -> CodeFragment {
    match StepKind::resolve(step) {
        Ok(StepKind::Unrecognized { action }) => {
            let reason = Degradation::UnknownAction(action);
            CodeFragment {
                source: placeholder(step, &reason),
                degradation: Some(reason),
            }
        }
        Ok(kind) => CodeFragment {
            source: render(&kind),
            degradation: None,
        },
        Err(reason) => CodeFragment {
            source: placeholder(step, &reason),
            degradation: Some(reason),
        },
    }
}

/// Artifact path (relative to the workspace) a plot step writes to.
pub fn plot_artifact_path(plot: &PlotKind) -> String {
    match plot {
        PlotKind::Histogram { column } => format!(
            "{PLOTS_DIR}/{}_histogram.{PLOT_EXT}",
            file_component(column)
        ),
        PlotKind::Scatter { x, y } => format!(
            "{PLOTS_DIR}/{}_{}_scatter.{PLOT_EXT}",
            file_component(x),
            file_component(y)
        ),
    }
}

fn render(kind: &StepKind) -> String {
    match kind {
        StepKind::LoadData { file_path, format } => {
            let path = quoted(file_path);
            let reader = match format {
                FileFormat::Csv => format!("pd.read_csv({path})"),
                FileFormat::Tsv => format!("pd.read_csv({path}, sep=\"\\t\")"),
                FileFormat::Json => format!("pd.read_json({path})"),
                FileFormat::Excel => format!("pd.read_excel({path})"),
                FileFormat::Parquet => format!("pd.read_parquet({path})"),
            };
            format!(
                "# Load and validate data\n\
                 df = {reader}\n\
                 print(f\"Loaded {{len(df)}} rows, {{len(df.columns)}} columns\")\n\
                 print(df.head())\n"
            )
        }
        StepKind::ComputeStatistics { columns } => {
            format!(
                "# Compute descriptive statistics\n\
                 stats_df = {}.describe()\n\
                 print(stats_df)\n",
                frame_selection(columns)
            )
        }
        StepKind::CreatePlot(plot @ PlotKind::Histogram { column }) => {
            let artifact = quoted(&plot_artifact_path(plot));
            format!(
                "# Create histogram\n\
                 column = {col}\n\
                 plt.figure(figsize=(10, 6))\n\
                 plt.hist(df[column].dropna(), bins=30, edgecolor=\"black\")\n\
                 plt.title(f\"Distribution of {{column}}\")\n\
                 plt.xlabel(column)\n\
                 plt.ylabel(\"Frequency\")\n\
                 plt.grid(True, alpha=0.3)\n\
                 plt.savefig({artifact}, dpi=300, bbox_inches=\"tight\")\n\
                 plt.close()\n\
                 print(\"Saved\", {artifact})\n",
                col = quoted(column),
            )
        }
        StepKind::CreatePlot(plot @ PlotKind::Scatter { x, y }) => {
            let artifact = quoted(&plot_artifact_path(plot));
            format!(
                "# Create scatter plot\n\
                 x_col = {x}\n\
                 y_col = {y}\n\
                 plt.figure(figsize=(10, 6))\n\
                 plt.scatter(df[x_col], df[y_col], alpha=0.6)\n\
                 plt.title(f\"{{y_col}} vs {{x_col}}\")\n\
                 plt.xlabel(x_col)\n\
                 plt.ylabel(y_col)\n\
                 plt.grid(True, alpha=0.3)\n\
                 plt.savefig({artifact}, dpi=300, bbox_inches=\"tight\")\n\
                 plt.close()\n\
                 print(\"Saved\", {artifact})\n",
                x = quoted(x),
                y = quoted(y),
            )
        }
        StepKind::ComputeCorrelations { columns } => {
            let frame = if columns.is_empty() {
                "df.select_dtypes(include=\"number\")".to_string()
            } else {
                format!("df[{}]", quoted_list(columns))
            };
            let artifact = quoted(&format!("{PLOTS_DIR}/correlation_matrix.{PLOT_EXT}"));
            format!(
                "# Compute correlation matrix\n\
                 corr = {frame}.corr()\n\
                 print(corr)\n\
                 \n\
                 plt.figure(figsize=(10, 8))\n\
                 if sns is not None:\n\
                 \x20   sns.heatmap(corr, annot=True, cmap=\"coolwarm\", center=0, square=True)\n\
                 else:\n\
                 \x20   plt.imshow(corr, cmap=\"coolwarm\", vmin=-1, vmax=1)\n\
                 \x20   plt.colorbar()\n\
                 \x20   plt.xticks(range(len(corr.columns)), corr.columns, rotation=45)\n\
                 \x20   plt.yticks(range(len(corr.columns)), corr.columns)\n\
                 plt.title(\"Correlation Matrix\")\n\
                 plt.tight_layout()\n\
                 plt.savefig({artifact}, dpi=300, bbox_inches=\"tight\")\n\
                 plt.close()\n"
            )
        }
        StepKind::GenerateReport => "# Report generation handled by the report synthesizer\n\
             print(\"Report generation completed\")\n"
            .to_string(),
        StepKind::Unrecognized { action } => {
            // Normally routed through `placeholder`; kept total for the match.
            format!("# Unsupported action: {}\npass\n", comment_text(action))
        }
    }
}

fn placeholder(step: &Step, reason: &Degradation) -> String {
    format!(
        "# Execute: {name}\n\
         # Action: {action} (skipped: {reason})\n\
         print(\"Executing step {n}:\", {name_lit})\n",
        name = comment_text(&step.name),
        action = comment_text(step.action.as_str()),
        reason = comment_text(&reason.to_string()),
        n = step.step_number,
        name_lit = quoted(&step.name),
    )
}

fn frame_selection(columns: &[String]) -> String {
    if columns.is_empty() {
        "df".to_string()
    } else {
        format!("df[{}]", quoted_list(columns))
    }
}

fn missing(action: &Action, parameter: &'static str) -> Degradation {
    Degradation::MissingParameter {
        action: action.to_string(),
        parameter,
    }
}

fn invalid(action: &Action, parameter: &'static str, reason: String) -> Degradation {
    Degradation::InvalidParameter {
        action: action.to_string(),
        parameter,
        reason,
    }
}

/// Scalar parameter as text. Numbers are accepted (column names such as `2021`).
fn string_param(
    params: &Parameters,
    action: &Action,
    key: &'static str,
) -> Result<Option<String>, Degradation> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(invalid(
            action,
            key,
            format!("expected a string, got {}", json_type(other)),
        )),
    }
}

/// First present key among aliases.
fn first_string(
    params: &Parameters,
    action: &Action,
    keys: &[&'static str],
) -> Result<Option<String>, Degradation> {
    for key in keys {
        if let Some(value) = string_param(params, action, key)? {
            return Ok(Some(value));
        }
    }
    Ok(None)
}

/// `columns` as a list; a single string is treated as a one-element list.
fn columns_param(params: &Parameters, action: &Action) -> Result<Vec<String>, Degradation> {
    match params.get("columns") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(s)) => Ok(vec![s.clone()]),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                Value::Number(n) => Ok(n.to_string()),
                other => Err(invalid(
                    action,
                    "columns",
                    format!("expected column names, got {}", json_type(other)),
                )),
            })
            .collect(),
        Some(other) => Err(invalid(
            action,
            "columns",
            format!("expected a list, got {}", json_type(other)),
        )),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn load_data_reads_declared_path_and_type() {
        let step = Step::new(1, "Load Data", "load_data")
            .with_param("file_path", "data.csv")
            .with_param("file_type", ".csv");

        let frag = compile_step(&step);
        assert!(frag.degradation.is_none());
        assert!(frag.source.contains("pd.read_csv(\"data.csv\")"));
        assert!(frag.source.contains("print(df.head())"));
    }

    #[test]
    fn load_data_accepts_path_alias_and_excel() {
        let step = Step::new(1, "Load", "LoadData")
            .with_param("path", "book.xlsx")
            .with_param("file_type", "xlsx");
        assert!(compile_step(&step).source.contains("pd.read_excel(\"book.xlsx\")"));
    }

    #[test]
    fn compute_stats_selects_columns_as_literals() {
        let step = Step::new(2, "Statistics", "compute_stats")
            .with_param("columns", json!(["sensor1", "sensor2"]));
        let frag = compile_step(&step);
        assert!(frag.source.contains("df[[\"sensor1\", \"sensor2\"]].describe()"));

        let all = compile_step(&Step::new(2, "Statistics", "compute_stats"));
        assert!(all.source.contains("stats_df = df.describe()"));
    }

    #[test]
    fn histogram_names_artifact_after_column() {
        let step = Step::new(3, "Plot", "create_plot")
            .with_param("plot_type", "histogram")
            .with_param("column", "temperature");
        let frag = compile_step(&step);
        assert!(frag.source.contains("plt.hist"));
        assert!(frag.source.contains("\"temperature\""));
        assert!(frag.source.contains("\"plots/temperature_histogram.png\""));
    }

    #[test]
    fn scatter_references_both_columns_and_artifact() {
        let step = Step::new(4, "Scatter", "CreatePlot")
            .with_param("plot_type", "scatter")
            .with_param("x", "a")
            .with_param("y", "b");
        let frag = compile_step(&step);
        assert!(frag.degradation.is_none());
        assert!(frag.source.contains("x_col = \"a\""));
        assert!(frag.source.contains("y_col = \"b\""));
        assert!(frag.source.contains("plots/a_b_scatter.png"));
    }

    #[test]
    fn correlations_default_to_numeric_columns() {
        let frag = compile_step(&Step::new(5, "Corr", "compute_correlations"));
        assert!(frag.source.contains("df.select_dtypes(include=\"number\").corr()"));
        assert!(frag.source.contains("plots/correlation_matrix.png"));
    }

    #[test]
    fn unknown_action_degrades_to_placeholder() {
        let step = Step::new(7, "Train model", "train_model");
        let frag = compile_step(&step);
        assert_eq!(
            frag.degradation,
            Some(Degradation::UnknownAction("train_model".to_string()))
        );
        assert!(frag.source.contains("Executing step 7:"));
        assert!(frag.source.contains("\"Train model\""));
    }

    #[test]
    fn missing_required_parameter_degrades() {
        let step = Step::new(2, "Scatter", "create_plot").with_param("plot_type", "scatter");
        let frag = compile_step(&step);
        assert!(matches!(
            frag.degradation,
            Some(Degradation::MissingParameter { parameter: "x", .. })
        ));
        assert!(frag.source.contains("Executing step 2:"));
    }

    #[test]
    fn unsupported_file_type_degrades() {
        let step = Step::new(1, "Load", "load_data")
            .with_param("file_path", "x.sas")
            .with_param("file_type", "sas7bdat");
        assert!(matches!(
            compile_step(&step).degradation,
            Some(Degradation::InvalidParameter { parameter: "file_type", .. })
        ));
    }

    #[test]
    fn parameter_text_cannot_break_out_of_literals() {
        let hostile = "x\")\nimport os; os.system(\"rm -rf /\")\n#";
        let step = Step::new(1, "Plot", "create_plot").with_param("column", hostile);
        let frag = compile_step(&step);

        // Every line is either a template line or the quoted assignment.
        let column_line = frag
            .source
            .lines()
            .find(|l| l.starts_with("column = "))
            .unwrap();
        assert_eq!(column_line, format!("column = {}", quoted(hostile)));
        assert!(!frag.source.lines().any(|l| l.starts_with("import os")));
    }

    #[test]
    fn hostile_step_name_stays_in_comment_and_literal() {
        let step = Step::new(9, "bad\nimport os", "nope");
        let frag = compile_step(&step);
        assert!(frag.source.contains("# Execute: bad import os\n"));
        assert!(!frag.source.lines().any(|l| l.starts_with("import os")));
    }
}
