//! Report lines - one per package
//!
//! `{icon} {name}\t{version}\t{filename}` with name and version padded to
//! the widest entry, followed by one tab-indented line per diagnostic.

use crossterm::style::Stylize;
use wheelpick_core::{PackageReport, ResolutionStatus, ResolvedPackage};

const ICON_WHEEL: &str = "📦";
const ICON_SOURCE: &str = "🏗";
const ICON_FAILED: &str = "✘";

/// Padding applied to the name and version columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnWidths {
    pub name: usize,
    pub version: usize,
}

impl ColumnWidths {
    /// Widest name and version among `packages`.
    pub fn measure(packages: &[ResolvedPackage]) -> Self {
        packages.iter().fold(Self::default(), |acc, p| Self {
            name: acc.name.max(p.name().chars().count()),
            version: acc.version.max(p.version().chars().count()),
        })
    }
}

/// Outcome class of a report line, which picks its color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    /// Nothing to report
    Clean,
    /// Diagnostics were raised
    Warning,
    /// The package failed
    Failed,
}

impl Tone {
    pub fn of(report: &PackageReport) -> Self {
        if report.is_fatal() {
            Self::Failed
        } else if report.diagnostics().next().is_some() {
            Self::Warning
        } else {
            Self::Clean
        }
    }

    fn paint(self, text: String, color: bool) -> String {
        if !color {
            return text;
        }
        match self {
            Self::Clean => text.green().to_string(),
            Self::Warning => text.yellow().to_string(),
            Self::Failed => text.red().to_string(),
        }
    }
}

fn icon(status: ResolutionStatus) -> &'static str {
    match status {
        ResolutionStatus::Binary => ICON_WHEEL,
        ResolutionStatus::SourceBuild => ICON_SOURCE,
        ResolutionStatus::Unresolved => ICON_FAILED,
    }
}

/// Render a package's report line and its diagnostics, without a trailing
/// newline.
pub fn render_report(report: &PackageReport, widths: ColumnWidths, color: bool) -> String {
    let tone = Tone::of(report);
    let package = report.package();
    let line = format!(
        "{} {:<name_w$}\t{:<version_w$}\t{}",
        icon(report.status()),
        package.name().as_str(),
        package.version().as_str(),
        report.filename(),
        name_w = widths.name,
        version_w = widths.version,
    );

    let mut out = tone.paint(line, color);
    for diagnostic in report.diagnostics() {
        out.push('\n');
        out.push_str(&tone.paint(format!("\t{diagnostic}"), color));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use wheelpick_core::io::FetchError;
    use wheelpick_core::io::index::ReleaseFile;
    use wheelpick_core::package::{FileRecord, PackageRecord};
    use wheelpick_core::verify::{Verification, VerifyOptions, match_release_files};
    use wheelpick_schema::{
        FileHash, Implementation, Libc, Machine, PackageName, PlatformProfile, RuntimeVersion, Version,
    };

    const DIGEST: &str = "8abb2f1d86890a2dfb989f9a77cfcfd3e47c2a354b01111771326f8aa26e0254";

    fn resolved(name: &str, version: &str, filename: &str) -> ResolvedPackage {
        let record = PackageRecord {
            name: PackageName::new(name),
            version: Version::new(version),
            runtime_constraint: None,
            repository: "pypi.org".to_string(),
            files: vec![FileRecord::new(
                filename,
                FileHash::parse(&format!("sha256:{DIGEST}")).unwrap(),
            )],
        };
        let profile = PlatformProfile::linux(
            Implementation::CPython,
            RuntimeVersion::new(3, 11, 0),
            Libc::glibc(2, 31),
            Machine::new("x86_64"),
        );
        ResolvedPackage::resolve(&record, &profile)
    }

    fn located(package: ResolvedPackage, filename: &str) -> PackageReport {
        let listed = ReleaseFile {
            filename: filename.to_string(),
            url: format!("https://files.example/{filename}"),
            digests: [("sha256".to_string(), DIGEST.to_string())].into(),
        };
        let verification = match_release_files(&package, &[listed], VerifyOptions::default()).unwrap();
        PackageReport::new(package, verification)
    }

    #[test]
    fn widths_follow_the_longest_entries() {
        let packages = [
            resolved("six", "1.16.0", "six-1.16.0-py2.py3-none-any.whl"),
            resolved("charset-normalizer", "3.1", "charset_normalizer-3.1.tar.gz"),
        ];
        let widths = ColumnWidths::measure(&packages);
        assert_eq!(widths, ColumnWidths { name: 18, version: 6 });
    }

    #[test]
    fn wheel_line() {
        let wheel = "six-1.16.0-py2.py3-none-any.whl";
        let report = located(resolved("six", "1.16.0", wheel), wheel);
        let widths = ColumnWidths { name: 5, version: 8 };
        assert_eq!(
            render_report(&report, widths, false),
            format!("📦 six  \t1.16.0  \t{wheel}")
        );
    }

    #[test]
    fn source_line() {
        let sdist = "six-1.16.0.tar.gz";
        let report = located(resolved("six", "1.16.0", sdist), sdist);
        let line = render_report(&report, ColumnWidths::default(), false);
        assert_eq!(line, format!("🏗 six\t1.16.0\t{sdist}"));
        assert_eq!(Tone::of(&report), Tone::Clean);
    }

    #[test]
    fn failed_line_lists_diagnostics() {
        let package = resolved("six", "1.16.0", "six-1.16.0.tar.gz");
        let error = FetchError::MissingUrl {
            package: "six".to_string(),
        };
        let report = PackageReport::new(package, Verification::failed(&error));

        assert_eq!(Tone::of(&report), Tone::Failed);
        let rendered = render_report(&report, ColumnWidths::default(), false);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "✘ six\t1.16.0\t");
        assert_eq!(lines[1], format!("\t{error}"));
    }

    #[test]
    fn unlocated_line_is_a_warning() {
        let package = resolved("six", "1.16.0", "six-1.16.0.tar.gz");
        let mut verification = Verification::default();
        let error = FetchError::MissingUrl {
            package: "six".to_string(),
        };
        verification.note(&error);
        let report = PackageReport::new(package, verification);

        assert_eq!(Tone::of(&report), Tone::Warning);
        let rendered = render_report(&report, ColumnWidths::default(), false);
        assert_eq!(rendered, format!("✘ six\t1.16.0\t\n\t{error}"));
    }
}
