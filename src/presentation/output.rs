//! Output Rendering
//!
//! Reports go to stdout, either as text for operators or as JSON for
//! pipelines. Logs never share this stream.

use std::io::{self, Write};

use serde::Serialize;

use crate::application::{
    AuditReport, ConnectionSummary, EdgeReport, EdgeStatus, RouteOutcome, RunKind, RunReport,
};
use crate::config::{ConfigWarning, OutputFormat};
use crate::domain::services::Topology;

/// Concrete format after resolving `auto`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderFormat {
    Text,
    Json,
}

impl RenderFormat {
    /// `--json` wins; `auto` picks JSON when stdout is not a terminal
    pub fn resolve(configured: OutputFormat, json_flag: bool, stdout_is_terminal: bool) -> Self {
        if json_flag {
            return Self::Json;
        }
        match configured {
            OutputFormat::Json => Self::Json,
            OutputFormat::Text => Self::Text,
            OutputFormat::Auto if stdout_is_terminal => Self::Text,
            OutputFormat::Auto => Self::Json,
        }
    }
}

/// Icons for output rendering
struct Icons {
    check: &'static str,
    cross: &'static str,
    warn: &'static str,
    skip: &'static str,
    arrow: &'static str,
}

impl Icons {
    fn unicode() -> Self {
        Self {
            check: "✓",
            cross: "✗",
            warn: "!",
            skip: "○",
            arrow: "→",
        }
    }

    fn ascii() -> Self {
        Self {
            check: "[OK]",
            cross: "[FAIL]",
            warn: "[WARN]",
            skip: "[SKIP]",
            arrow: "->",
        }
    }

    fn status(&self, status: EdgeStatus) -> &'static str {
        match status {
            EdgeStatus::Succeeded => self.check,
            EdgeStatus::Degraded => self.warn,
            EdgeStatus::Failed => self.cross,
            EdgeStatus::Skipped => self.skip,
        }
    }
}

fn connection_line(c: &ConnectionSummary, out: &mut dyn Write) -> io::Result<()> {
    let mut flags = Vec::new();
    if c.created {
        flags.push("created");
    }
    if c.accepted {
        flags.push("accepted");
    }
    if c.would_request {
        flags.push("would request");
    }
    if c.deleted {
        flags.push("deleted");
    }
    if c.would_delete {
        flags.push("would delete");
    }
    let id = if c.id.is_planned() {
        "(new)".to_string()
    } else {
        c.id.to_string()
    };
    if flags.is_empty() {
        writeln!(out, "    connection {} {}", id, c.status)
    } else {
        writeln!(out, "    connection {} {} ({})", id, c.status, flags.join(", "))
    }
}

/// One-line tally, also used as the last line of text output
pub fn summary_line(report: &RunReport) -> String {
    let verb = match report.kind {
        RunKind::Apply => "Apply",
        RunKind::Plan => "Plan",
        RunKind::Teardown if report.dry_run => "Teardown plan",
        RunKind::Teardown => "Teardown",
    };
    let t = &report.tally;
    format!(
        "{} finished: {} succeeded, {} degraded, {} failed, {} skipped",
        verb, t.succeeded, t.degraded, t.failed, t.skipped
    )
}

/// Text renderer for reports
pub struct TextRenderer {
    pub unicode: bool,
    /// Show unchanged routes at 1 and above
    pub verbose: u8,
}

impl Default for TextRenderer {
    fn default() -> Self {
        Self {
            unicode: true,
            verbose: 0,
        }
    }
}

impl TextRenderer {
    fn icons(&self) -> Icons {
        if self.unicode {
            Icons::unicode()
        } else {
            Icons::ascii()
        }
    }

    pub fn run(&self, report: &RunReport, out: &mut dyn Write) -> io::Result<()> {
        let icons = self.icons();

        for edge in &report.edges {
            self.edge(edge, &icons, out)?;
        }

        let t = &report.tally;
        if !report.edges.is_empty() {
            writeln!(out)?;
        }
        match report.kind {
            RunKind::Teardown => writeln!(out, "Routes: {} removed", t.routes_removed)?,
            _ => writeln!(
                out,
                "Routes: {} created, {} already satisfied, {} replaced, {} conflicts",
                t.routes_created, t.routes_satisfied, t.routes_replaced, t.conflicts
            )?,
        }
        writeln!(out, "{}", summary_line(report))
    }

    fn edge(&self, edge: &EdgeReport, icons: &Icons, out: &mut dyn Write) -> io::Result<()> {
        writeln!(
            out,
            "{} {} {} {}  {}",
            icons.status(edge.status),
            edge.source,
            icons.arrow,
            edge.target,
            edge.status
        )?;

        for c in edge.connection.iter().chain(&edge.extra_connections) {
            connection_line(c, out)?;
        }

        for dns in &edge.dns {
            writeln!(
                out,
                "    dns {} ({}) {} {}",
                dns.peer,
                dns.side,
                if dns.enabled { "on" } else { "off" },
                dns.outcome.as_str()
            )?;
        }

        for route in &edge.routes {
            if route.outcome == RouteOutcome::AlreadySatisfied && self.verbose == 0 {
                continue;
            }
            write!(
                out,
                "    route {} {} {} {} {}",
                route.table,
                route.scope,
                route.destination,
                icons.arrow,
                route.next_hop
            )?;
            write!(out, "  {}", route.outcome.as_str())?;
            if let Some(detail) = &route.detail {
                write!(out, " ({})", detail)?;
            }
            writeln!(out)?;
        }
        let satisfied = edge.count(RouteOutcome::AlreadySatisfied);
        if satisfied > 0 && self.verbose == 0 {
            writeln!(out, "    {} routes already in place", satisfied)?;
        }

        for warning in &edge.warnings {
            writeln!(out, "    {} {}", icons.warn, warning)?;
        }
        for error in &edge.errors {
            writeln!(out, "    {} [{}] {}", icons.cross, error.kind(), error)?;
        }
        Ok(())
    }

    pub fn audit(&self, report: &AuditReport, out: &mut dyn Write) -> io::Result<()> {
        let icons = self.icons();
        for finding in &report.findings {
            writeln!(
                out,
                "{} {} table {} routes {} {} {} ({})",
                icons.cross,
                finding.peer,
                finding.table,
                finding.destination,
                icons.arrow,
                finding.next_hop,
                finding.reason.as_str()
            )?;
        }
        for failure in &report.errors {
            writeln!(
                out,
                "{} {} could not be audited: {}",
                icons.warn, failure.peer, failure.error
            )?;
        }
        let headline = if report.is_clean() {
            icons.check
        } else {
            icons.cross
        };
        writeln!(
            out,
            "{} Audit finished: {} peers, {} tables, {} findings, {} errors",
            headline,
            report.peers_checked,
            report.tables_checked,
            report.findings.len(),
            report.errors.len()
        )
    }

    pub fn validation(
        &self,
        topology: &Topology,
        warnings: &[ConfigWarning],
        out: &mut dyn Write,
    ) -> io::Result<()> {
        let icons = self.icons();
        for warning in warnings {
            writeln!(out, "{} {}", icons.warn, warning)?;
        }
        for edge in &topology.edges {
            writeln!(out, "  {} {} {}", edge.source, icons.arrow, edge.target)?;
        }
        writeln!(
            out,
            "{} Inventory valid: {} peers, {} edges",
            icons.check,
            topology.registry.len(),
            topology.edges.len()
        )
    }
}

#[derive(Serialize)]
struct ValidationJson<'a> {
    valid: bool,
    peers: usize,
    edges: &'a [crate::domain::entities::PeeringEdge],
    warnings: Vec<String>,
}

/// Pretty JSON followed by a newline
pub fn write_json<T: Serialize>(value: &T, out: &mut dyn Write) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)
}

pub fn render_run(
    report: &RunReport,
    format: RenderFormat,
    renderer: &TextRenderer,
    out: &mut dyn Write,
) -> io::Result<()> {
    match format {
        RenderFormat::Text => renderer.run(report, out),
        RenderFormat::Json => write_json(report, out),
    }
}

pub fn render_audit(
    report: &AuditReport,
    format: RenderFormat,
    renderer: &TextRenderer,
    out: &mut dyn Write,
) -> io::Result<()> {
    match format {
        RenderFormat::Text => renderer.audit(report, out),
        RenderFormat::Json => write_json(report, out),
    }
}

pub fn render_validation(
    topology: &Topology,
    warnings: &[ConfigWarning],
    format: RenderFormat,
    renderer: &TextRenderer,
    out: &mut dyn Write,
) -> io::Result<()> {
    match format {
        RenderFormat::Text => renderer.validation(topology, warnings, out),
        RenderFormat::Json => write_json(
            &ValidationJson {
                valid: true,
                peers: topology.registry.len(),
                edges: &topology.edges,
                warnings: warnings.iter().map(|w| w.to_string()).collect(),
            },
            out,
        ),
    }
}
