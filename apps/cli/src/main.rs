mod scan;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use places_settings::{ExplorerPreferences, MemoryStateStore, PreferencesStore};
use places_tree::{MemoryGraph, ResourceId, TreeViewAdapter};
use tracing_subscriber::EnvFilter;

use crate::scan::ScannedWorkspace;

#[derive(Parser)]
#[command(
    name = "places-cli",
    about = "Inspect workspaces through the places tree",
    author,
    version
)]
struct Cli {
    /// 輸出除錯紀錄。 / Emit debug logging on stderr.
    #[arg(long, short, global = true)]
    verbose: bool,
    /// 偏好設定檔路徑。 / Preferences file (defaults to .places/preferences.json).
    #[arg(long, global = true, value_name = "FILE")]
    preferences: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 顯示資料夾樹。 / Print the tree of one or more roots.
    Tree(TreeArgs),
    /// 評估拖放效果。 / Evaluate the effect of a drag and drop.
    Drop(DropArgs),
    /// 匯入/匯出偏好設定。 / Import or export preferences.
    #[command(subcommand)]
    Preferences(PreferencesCommand),
}

#[derive(Args)]
struct TreeArgs {
    /// 作為專案的資料夾。 / Directories loaded as projects.
    #[arg(required = true, value_name = "ROOT")]
    roots: Vec<PathBuf>,

    /// 只顯示名稱包含此字串的項目（區分大小寫）。 / Only show entries whose name contains TERM (case-sensitive).
    #[arg(long, value_name = "TERM")]
    filter: Option<String>,
}

#[derive(Args)]
struct DropArgs {
    /// 作為專案的資料夾。 / Directories loaded as projects.
    #[arg(required = true, value_name = "ROOT")]
    roots: Vec<PathBuf>,

    /// 被拖曳的路徑。 / Paths being dragged.
    #[arg(long, required = true, num_args = 1.., value_name = "PATH")]
    drag: Vec<PathBuf>,

    /// 放置目標。 / Drop target.
    #[arg(long, value_name = "PATH", required_unless_present = "onto_root")]
    onto: Option<PathBuf>,

    /// 放置在工作區根節點。 / Drop onto the workspace root.
    #[arg(long, conflicts_with = "onto")]
    onto_root: bool,

    /// 被拖曳的是工作區外的檔案。 / Dragged paths come from outside the workspace.
    #[arg(long)]
    external: bool,
}

#[derive(Subcommand)]
enum PreferencesCommand {
    /// 匯出偏好設定。 / Export preferences to a file.
    Export(PreferencesExportArgs),
    /// 匯入偏好設定。 / Import preferences from a file.
    Import(PreferencesImportArgs),
}

#[derive(Args)]
struct PreferencesExportArgs {
    /// 輸出檔案路徑。 / Destination file path.
    #[arg(long, value_name = "FILE")]
    output: PathBuf,
}

#[derive(Args)]
struct PreferencesImportArgs {
    /// 輸入檔案路徑。 / Source preferences JSON.
    #[arg(value_name = "FILE")]
    input: PathBuf,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let Cli {
        verbose,
        preferences,
        command,
    } = Cli::parse();
    init_logging(verbose);
    let prefs_path = match preferences {
        Some(path) => resolve_input_path(&path)?,
        None => default_preferences_path()?,
    };
    match command {
        Commands::Tree(args) => print_tree(args, &prefs_path),
        Commands::Drop(args) => evaluate_drop(args, &prefs_path),
        Commands::Preferences(subcommand) => execute_preferences_command(subcommand, &prefs_path),
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_explorer_preferences(prefs_path: &Path) -> Result<ExplorerPreferences> {
    let store = PreferencesStore::load(prefs_path)
        .with_context(|| format!("failed to load preferences from {}", prefs_path.display()))?;
    Ok(store.preferences().explorer.clone())
}

fn open_adapter(
    roots: &[PathBuf],
    prefs_path: &Path,
) -> Result<(ScannedWorkspace, TreeViewAdapter<MemoryGraph, MemoryStateStore>)> {
    let explorer = load_explorer_preferences(prefs_path)?;
    let workspace = ScannedWorkspace::scan(roots)?;
    let adapter = TreeViewAdapter::new(workspace.graph.clone(), MemoryStateStore::new(), &explorer);
    Ok((workspace, adapter))
}

fn print_tree(args: TreeArgs, prefs_path: &Path) -> Result<()> {
    let (_, mut adapter) = open_adapter(&args.roots, prefs_path)?;
    adapter
        .set_filter(args.filter.as_deref())
        .context("failed to apply filter")?;

    let mut stack: Vec<(ResourceId, usize)> = top_down(&mut adapter, None, 0)?;
    while let Some((id, depth)) = stack.pop() {
        let Some(resource) = adapter.index().resource(id) else {
            continue;
        };
        let suffix = if resource.is_container() { "/" } else { "" };
        println!("{}{}{}", "  ".repeat(depth), resource.name, suffix);
        if adapter.has_children(Some(id)) {
            stack.extend(top_down(&mut adapter, Some(id), depth + 1)?);
        }
    }
    Ok(())
}

/// Children of `parent` in reverse order, ready to be pushed on a stack.
fn top_down(
    adapter: &mut TreeViewAdapter<MemoryGraph, MemoryStateStore>,
    parent: Option<ResourceId>,
    depth: usize,
) -> Result<Vec<(ResourceId, usize)>> {
    let count = adapter.child_count(parent);
    let mut children = Vec::with_capacity(count);
    for position in (0..count).rev() {
        children.push((adapter.child_at(parent, position)?, depth));
    }
    Ok(children)
}

fn evaluate_drop(args: DropArgs, prefs_path: &Path) -> Result<()> {
    let (workspace, adapter) = open_adapter(&args.roots, prefs_path)?;
    let target = match (&args.onto, args.onto_root) {
        (_, true) => None,
        (Some(path), false) => Some(workspace.resolve(path)?),
        (None, false) => bail!("either --onto or --onto-root is required"),
    };

    let effect = if args.external {
        let files = args
            .drag
            .iter()
            .map(|path| resolve_input_path(path))
            .collect::<Result<Vec<_>>>()?;
        adapter.drop_effect_for(&files, target)
    } else {
        let dragged = args
            .drag
            .iter()
            .map(|path| workspace.resolve(path))
            .collect::<Result<Vec<_>>>()?;
        adapter.drop_effect_for_internal(&dragged, target)
    };
    println!("{effect}");
    Ok(())
}

fn execute_preferences_command(command: PreferencesCommand, prefs_path: &Path) -> Result<()> {
    match command {
        PreferencesCommand::Export(args) => export_preferences(args, prefs_path),
        PreferencesCommand::Import(args) => import_preferences(args, prefs_path),
    }
}

fn export_preferences(args: PreferencesExportArgs, prefs_path: &Path) -> Result<()> {
    let store = PreferencesStore::load(prefs_path)
        .with_context(|| format!("failed to load preferences from {}", prefs_path.display()))?;
    let output = resolve_input_path(&args.output)?;
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    store
        .export_to(&output)
        .with_context(|| format!("failed to export preferences to {}", output.display()))?;
    println!("Exported preferences to {}", output.display());
    Ok(())
}

fn import_preferences(args: PreferencesImportArgs, prefs_path: &Path) -> Result<()> {
    let mut store = PreferencesStore::load(prefs_path)
        .with_context(|| format!("failed to load preferences from {}", prefs_path.display()))?;
    let input = resolve_input_path(&args.input)?;
    if !input.exists() {
        bail!("preferences file '{}' does not exist", input.display());
    }
    store
        .import_from(&input)
        .with_context(|| format!("failed to import preferences from {}", input.display()))?;
    println!("Imported preferences from {}", input.display());
    Ok(())
}

fn default_preferences_path() -> Result<PathBuf> {
    Ok(std::env::current_dir()
        .context("determine current directory")?
        .join(".places")
        .join("preferences.json"))
}

fn resolve_input_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()
            .context("determine current directory")?
            .join(path))
    }
}
