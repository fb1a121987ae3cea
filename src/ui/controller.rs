use anyhow::{Context, Result, bail};
use camino::Utf8Path;
use std::io::Write;
use std::sync::Arc;

use super::commands::Commands;
use super::console::print_until_done;
use crate::config::ConfigManager;
use crate::metrics::Metrics;
use crate::models::{AppSettings, DiskImageFormat};
use crate::project::Project;
use crate::services::{
    BuildEngine, BuildOrchestrator, BuildOutcome, Centroid, FeatureDetector, Point, snap,
};
use crate::state::StateManager;

/// Command line controller
///
/// Owns the long-lived pieces (settings, build state, orchestrator) and runs
/// one [`Commands`] at a time against a project file. Builds run on the tokio
/// runtime behind `runtime`; everything else is synchronous.
pub struct CliController {
    config_manager: ConfigManager,
    settings: AppSettings,
    state_manager: StateManager,
    orchestrator: BuildOrchestrator,
    detector: FeatureDetector,
    runtime: tokio::runtime::Handle,
}

impl CliController {
    pub fn new(
        config_manager: ConfigManager,
        settings: AppSettings,
        engine: Arc<dyn BuildEngine>,
        metrics: Arc<Metrics>,
        runtime: tokio::runtime::Handle,
    ) -> Self {
        let state_manager = StateManager::new();
        let orchestrator =
            BuildOrchestrator::new(state_manager.clone(), engine, metrics, &settings);

        Self {
            config_manager,
            settings,
            state_manager,
            orchestrator,
            detector: FeatureDetector::new(),
            runtime,
        }
    }

    pub fn state_manager(&self) -> &StateManager {
        &self.state_manager
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn config_manager(&self) -> &ConfigManager {
        &self.config_manager
    }

    /// Run a command, writing user facing output to `out`.
    pub fn run<W: Write>(&self, command: Commands, out: &mut W) -> Result<()> {
        tracing::debug!("Running command: {:?}", command);

        match command {
            Commands::Init { project, force } => self.init(&project, force, out),
            Commands::Show { project } => self.show(&project, out),
            Commands::Set {
                project,
                key,
                value,
            } => self.set(&project, &key, &value, out),
            Commands::AddFile {
                project,
                path,
                x,
                y,
                snap,
            } => self.add_file(&project, &path, Point::new(x, y), snap, out),
            Commands::AddSymlink {
                project,
                name,
                target,
                x,
                y,
                snap,
            } => self.add_symlink(&project, &name, &target, Point::new(x, y), snap, out),
            Commands::RemoveFile { project, index } => self.remove_file(&project, index, out),
            Commands::RemoveSymlink { project, index } => {
                self.remove_symlink(&project, index, out)
            }
            Commands::Detect { project } => self.detect(&project, out),
            Commands::Build { project, output } => self.build(&project, output.as_deref(), out),
            Commands::Formats => self.formats(out),
        }
    }

    fn open(path: &Utf8Path) -> Result<Project> {
        Project::open(path).with_context(|| format!("Failed to open project: {}", path))
    }

    fn save(project: &mut Project) -> Result<()> {
        project.save().context("Failed to save project")
    }

    fn init<W: Write>(&self, path: &Utf8Path, force: bool, out: &mut W) -> Result<()> {
        if path.exists() && !force {
            bail!("{} already exists (use --force to overwrite)", path);
        }

        let mut project = Project::new();
        project
            .save_as(path)
            .with_context(|| format!("Failed to create project: {}", path))?;

        writeln!(out, "Created {}", path)?;
        Ok(())
    }

    fn show<W: Write>(&self, path: &Utf8Path, out: &mut W) -> Result<()> {
        let project = Self::open(path)?;

        writeln!(out, "{}", path)?;
        for (key, value) in project.properties() {
            writeln!(out, "  {:<15} {}", key, value)?;
        }

        writeln!(out, "files ({}):", project.total_files())?;
        for (index, entry) in project.files().iter().enumerate() {
            writeln!(out, "  [{}] {} at ({}, {})", index, entry.file, entry.x, entry.y)?;
        }

        writeln!(out, "symlinks ({}):", project.total_symlinks())?;
        for (index, entry) in project.symlinks().iter().enumerate() {
            writeln!(
                out,
                "  [{}] {} -> {} at ({}, {})",
                index, entry.name, entry.shortcut, entry.x, entry.y
            )?;
        }

        writeln!(
            out,
            "build steps: {}",
            self.orchestrator.build_count(project.configuration())
        )?;
        Ok(())
    }

    fn set<W: Write>(&self, path: &Utf8Path, key: &str, value: &str, out: &mut W) -> Result<()> {
        let mut project = Self::open(path)?;
        project
            .set_property_str(key, value)
            .with_context(|| format!("Failed to set {}", key))?;
        Self::save(&mut project)?;

        let current = project.property(key)?;
        writeln!(out, "{} = {}", key, current)?;
        Ok(())
    }

    /// Centroids to snap to, or none if detection is off or fails.
    fn centroids_for(&self, project: &Project) -> Vec<Centroid> {
        let config = project.configuration();
        if !config.detectfeatures || !config.snaptofeatures || config.background.trim().is_empty() {
            return Vec::new();
        }

        match self.detector.detect_for_configuration(config, project.base_dir()) {
            Ok(regions) => regions.into_iter().map(|region| region.centroid).collect(),
            Err(e) => {
                tracing::warn!("Feature detection failed, not snapping to features: {}", e);
                Vec::new()
            }
        }
    }

    fn place(&self, project: &Project, point: Point, snap_point: bool) -> Point {
        if !snap_point {
            return point;
        }
        let centroids = self.centroids_for(project);
        snap(point, project.configuration(), &centroids)
    }

    fn add_file<W: Write>(
        &self,
        path: &Utf8Path,
        file: &str,
        point: Point,
        snap_point: bool,
        out: &mut W,
    ) -> Result<()> {
        let mut project = Self::open(path)?;
        let placed = self.place(&project, point, snap_point);
        let index = project.add_file(file, placed.x, placed.y);
        Self::save(&mut project)?;

        writeln!(out, "[{}] {} at ({}, {})", index, file, placed.x, placed.y)?;
        Ok(())
    }

    fn add_symlink<W: Write>(
        &self,
        path: &Utf8Path,
        name: &str,
        target: &str,
        point: Point,
        snap_point: bool,
        out: &mut W,
    ) -> Result<()> {
        let mut project = Self::open(path)?;
        let placed = self.place(&project, point, snap_point);
        let index = project.add_symlink(name, target, placed.x, placed.y);
        Self::save(&mut project)?;

        writeln!(
            out,
            "[{}] {} -> {} at ({}, {})",
            index, name, target, placed.x, placed.y
        )?;
        Ok(())
    }

    fn remove_file<W: Write>(&self, path: &Utf8Path, index: usize, out: &mut W) -> Result<()> {
        let mut project = Self::open(path)?;
        let removed = project.remove_file(index)?;
        Self::save(&mut project)?;

        writeln!(out, "Removed {}", removed.file)?;
        Ok(())
    }

    fn remove_symlink<W: Write>(&self, path: &Utf8Path, index: usize, out: &mut W) -> Result<()> {
        let mut project = Self::open(path)?;
        let removed = project.remove_symlink(index)?;
        Self::save(&mut project)?;

        writeln!(out, "Removed {}", removed.name)?;
        Ok(())
    }

    fn detect<W: Write>(&self, path: &Utf8Path, out: &mut W) -> Result<()> {
        let project = Self::open(path)?;
        let config = project.configuration();

        if !config.detectfeatures {
            writeln!(out, "Feature detection is turned off for this project")?;
            return Ok(());
        }

        let regions = self
            .detector
            .detect_for_configuration(config, project.base_dir())
            .context("Feature detection failed")?;

        writeln!(
            out,
            "{} features larger than {} px²:",
            regions.len(),
            config.featuresize
        )?;
        for region in &regions {
            writeln!(
                out,
                "  ({:.1}, {:.1}) area {}",
                region.centroid.x, region.centroid.y, region.area
            )?;
        }
        Ok(())
    }

    fn build<W: Write>(&self, path: &Utf8Path, output: Option<&str>, out: &mut W) -> Result<()> {
        let project = Self::open(path)?;

        // The settings default only applies when the project names no file
        let output = output.or_else(|| {
            let default_output = self.settings.default_output.as_str();
            let has_filename = !project.configuration().filename.trim().is_empty();
            (!has_filename).then_some(default_output)
        });

        // Subscribe first so no change is missed
        let rx = self.state_manager.subscribe();

        let handle = {
            let _guard = self.runtime.enter();
            self.orchestrator
                .start_build(&project.snapshot(), project.base_dir(), output)
                .context("Failed to start build")?
        };
        let output_path = handle.output_path().to_path_buf();

        let (_, outcome) = self
            .runtime
            .block_on(async { tokio::join!(print_until_done(rx, &mut *out), handle.wait()) });

        match outcome {
            BuildOutcome::Completed { .. } => {
                writeln!(out, "Built {}", output_path)?;
                Ok(())
            }
            BuildOutcome::Failed { message } => {
                self.orchestrator.acknowledge_failure();
                bail!("Build failed: {}", message)
            }
        }
    }

    fn formats<W: Write>(&self, out: &mut W) -> Result<()> {
        let default = DiskImageFormat::default();
        for format in DiskImageFormat::ALL {
            let marker = if format == default { " (default)" } else { "" };
            writeln!(out, "{:<5} {}{}", format.code(), format.description(), marker)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{BuildError, EngineMessage, EngineRequest};
    use camino::Utf8PathBuf;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    /// Replies with a fixed list of messages and remembers the request.
    struct ScriptedEngine {
        script: Vec<EngineMessage>,
        requests: Mutex<Vec<EngineRequest>>,
    }

    impl BuildEngine for ScriptedEngine {
        fn launch(
            &self,
            request: EngineRequest,
            sink: mpsc::UnboundedSender<EngineMessage>,
        ) -> Result<(), BuildError> {
            self.requests.lock().unwrap().push(request);
            for message in &self.script {
                let _ = sink.send(message.clone());
            }
            Ok(())
        }
    }

    struct Fixture {
        _temp_dir: TempDir,
        _runtime: tokio::runtime::Runtime,
        dir: Utf8PathBuf,
        controller: CliController,
        engine: Arc<ScriptedEngine>,
    }

    fn fixture(script: Vec<EngineMessage>) -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let engine = Arc::new(ScriptedEngine {
            script,
            requests: Mutex::new(Vec::new()),
        });
        let controller = CliController::new(
            ConfigManager::new(dir.join("settings")).unwrap(),
            AppSettings::default(),
            engine.clone(),
            Arc::new(Metrics::new()),
            runtime.handle().clone(),
        );

        Fixture {
            _temp_dir: temp_dir,
            _runtime: runtime,
            dir,
            controller,
            engine,
        }
    }

    fn run(fixture: &Fixture, command: Commands) -> Result<String> {
        let mut out = Vec::new();
        fixture.controller.run(command, &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    fn progress(json: &str) -> EngineMessage {
        EngineMessage::Progress(json.to_string())
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let fixture = fixture(Vec::new());
        let project = fixture.dir.join("app.toml");

        run(&fixture, Commands::Init { project: project.clone(), force: false }).unwrap();
        assert!(run(&fixture, Commands::Init { project: project.clone(), force: false }).is_err());
        run(&fixture, Commands::Init { project, force: true }).unwrap();
    }

    #[test]
    fn test_set_and_show() {
        let fixture = fixture(Vec::new());
        let project = fixture.dir.join("app.toml");
        run(&fixture, Commands::Init { project: project.clone(), force: false }).unwrap();

        let output = run(
            &fixture,
            Commands::Set {
                project: project.clone(),
                key: "gridsize".to_string(),
                value: "32x16".to_string(),
            },
        )
        .unwrap();
        assert_eq!(output, "gridsize = 32x16\n");

        let shown = run(&fixture, Commands::Show { project }).unwrap();
        assert!(shown.contains("gridsize"));
        assert!(shown.contains("32x16"));
        assert!(shown.contains("build steps: 12"));
    }

    #[test]
    fn test_set_rejects_invalid_value() {
        let fixture = fixture(Vec::new());
        let project = fixture.dir.join("app.toml");
        run(&fixture, Commands::Init { project: project.clone(), force: false }).unwrap();

        let result = run(
            &fixture,
            Commands::Set {
                project: project.clone(),
                key: "iconsize".to_string(),
                value: "9000".to_string(),
            },
        );
        assert!(result.is_err());
        assert_eq!(Project::open(&project).unwrap().configuration().iconsize, 128);
    }

    #[test]
    fn test_add_and_remove_entries() {
        let fixture = fixture(Vec::new());
        let project = fixture.dir.join("app.toml");
        run(&fixture, Commands::Init { project: project.clone(), force: false }).unwrap();

        run(
            &fixture,
            Commands::AddFile {
                project: project.clone(),
                path: "App.app".to_string(),
                x: 199,
                y: 276,
                snap: false,
            },
        )
        .unwrap();
        run(
            &fixture,
            Commands::AddSymlink {
                project: project.clone(),
                name: "Applications".to_string(),
                target: "/Applications".to_string(),
                x: 569,
                y: 276,
                snap: false,
            },
        )
        .unwrap();

        let loaded = Project::open(&project).unwrap();
        assert_eq!(loaded.total_files(), 1);
        assert_eq!(loaded.total_symlinks(), 1);

        run(&fixture, Commands::RemoveFile { project: project.clone(), index: 0 }).unwrap();
        assert!(run(&fixture, Commands::RemoveSymlink { project: project.clone(), index: 4 }).is_err());
        assert_eq!(Project::open(&project).unwrap().total_files(), 0);
    }

    #[test]
    fn test_add_file_snaps_to_grid() {
        let fixture = fixture(Vec::new());
        let project = fixture.dir.join("app.toml");
        run(&fixture, Commands::Init { project: project.clone(), force: false }).unwrap();
        run(
            &fixture,
            Commands::Set {
                project: project.clone(),
                key: "snaptogrid".to_string(),
                value: "true".to_string(),
            },
        )
        .unwrap();

        let output = run(
            &fixture,
            Commands::AddFile {
                project: project.clone(),
                path: "App.app".to_string(),
                x: 29,
                y: 51,
                snap: true,
            },
        )
        .unwrap();

        assert_eq!(output, "[0] App.app at (20, 60)\n");
    }

    #[test]
    fn test_build_streams_log() {
        let fixture = fixture(vec![
            progress(r#"{"type": "build::started"}"#),
            progress(r#"{"type": "operation::start", "operation": "dmg::create"}"#),
            progress(r#"{"type": "operation::finished"}"#),
            progress(r#"{"type": "build::finished"}"#),
            EngineMessage::Exited(Some(0)),
        ]);
        let project = fixture.dir.join("app.toml");
        run(&fixture, Commands::Init { project: project.clone(), force: false }).unwrap();

        let output = run(
            &fixture,
            Commands::Build {
                project,
                output: Some("dist/App.dmg".to_string()),
            },
        )
        .unwrap();

        assert!(output.contains("[dmg] Creating DMG..."));
        assert!(output.contains("Build took"));
        assert!(output.ends_with(&format!("Built {}\n", fixture.dir.join("dist/App.dmg"))));

        let requests = fixture.engine.requests.lock().unwrap();
        assert_eq!(requests[0].filename, fixture.dir.join("dist/App.dmg").as_str());
        assert_eq!(fixture.controller.state_manager().read(|state| state.step), 2);
    }

    #[test]
    fn test_build_failure_is_an_error() {
        let fixture = fixture(vec![
            progress(r#"{"type": "build::started"}"#),
            EngineMessage::Failure("hdiutil: create failed - Resource busy".to_string()),
            EngineMessage::Exited(Some(1)),
        ]);
        let project = fixture.dir.join("app.toml");
        run(&fixture, Commands::Init { project: project.clone(), force: false }).unwrap();

        let err = run(
            &fixture,
            Commands::Build {
                project,
                output: Some("App.dmg".to_string()),
            },
        )
        .unwrap_err();

        assert!(err.to_string().contains("hdiutil: create failed - Resource busy"));
    }

    #[test]
    fn test_build_without_output_fails() {
        let fixture = fixture(Vec::new());
        let project = fixture.dir.join("app.toml");
        run(&fixture, Commands::Init { project: project.clone(), force: false }).unwrap();

        let result = run(&fixture, Commands::Build { project, output: None });

        assert!(result.is_err());
        assert!(fixture.engine.requests.lock().unwrap().is_empty());
    }

    #[test]
    fn test_formats_lists_all() {
        let fixture = fixture(Vec::new());
        let output = run(&fixture, Commands::Formats).unwrap();

        assert_eq!(output.lines().count(), DiskImageFormat::ALL.len());
        assert!(output.lines().any(|line| line.starts_with("UDBZ") && line.ends_with("(default)")));
    }
}
