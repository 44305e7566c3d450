use clap::{ArgAction, Parser, Subcommand};
use cmis_browser::config::ENV_SERVICE_URL;
use cmis_browser::property::properties_to_object_json;
use cmis_browser::{
    CmisObject, CmisObjectCore, ConnectionConfig, Document, Folder, ObjectReadOptions, Repository,
    Server,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cmis-cli")]
#[command(about = "Command line client for CMIS browser binding repositories")]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Debug)]
struct ConnectionArgs {
    /// Overrides CMIS_SERVICE_URL.
    #[arg(long, global = true)]
    service_url: Option<String>,
    #[arg(long, global = true)]
    username: Option<String>,
    #[arg(long, global = true)]
    password: Option<String>,
    #[arg(long = "no-succinct", global = true, action = ArgAction::SetTrue)]
    no_succinct: bool,
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    log_requests: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Repositories,
    Info(RepositoryArgs),
    Get(GetArgs),
    Children(ChildrenArgs),
    CreateDocument(CreateDocumentArgs),
    Delete(DeleteArgs),
    Type(TypeArgs),
}

#[derive(clap::Args, Debug)]
struct RepositoryArgs {
    #[arg(long)]
    repository: String,
}

#[derive(clap::Args, Debug)]
struct GetArgs {
    #[arg(long)]
    repository: String,
    #[arg(long)]
    object_id: String,
    #[arg(long)]
    include_relationships: Option<String>,
    #[arg(long)]
    filter: Option<String>,
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

#[derive(clap::Args, Debug)]
struct ChildrenArgs {
    #[arg(long)]
    repository: String,
    /// Defaults to the root folder.
    #[arg(long)]
    folder_id: Option<String>,
    #[arg(long)]
    max_items: Option<i64>,
    #[arg(long)]
    skip_count: Option<i64>,
}

#[derive(clap::Args, Debug)]
struct CreateDocumentArgs {
    #[arg(long)]
    repository: String,
    #[arg(long)]
    name: String,
    /// Defaults to the root folder.
    #[arg(long)]
    folder_id: Option<String>,
    #[arg(long, default_value = "cmis:document")]
    type_id: String,
    #[arg(long)]
    file: Option<PathBuf>,
    /// Guessed from the file extension when omitted.
    #[arg(long)]
    mime_type: Option<String>,
}

#[derive(clap::Args, Debug)]
struct DeleteArgs {
    #[arg(long)]
    repository: String,
    #[arg(long)]
    object_id: String,
}

#[derive(clap::Args, Debug)]
struct TypeArgs {
    #[arg(long)]
    repository: String,
    #[arg(long)]
    type_id: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Repositories => repositories_command(&cli.connection).await,
        Commands::Info(args) => info_command(&cli.connection, args).await,
        Commands::Get(args) => get_command(&cli.connection, args).await,
        Commands::Children(args) => children_command(&cli.connection, args).await,
        Commands::CreateDocument(args) => create_document_command(&cli.connection, args).await,
        Commands::Delete(args) => delete_command(&cli.connection, args).await,
        Commands::Type(args) => type_command(&cli.connection, args).await,
    };

    match result {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_config(args: &ConnectionArgs) -> Result<ConnectionConfig, String> {
    let mut config = ConnectionConfig::from_lookup(|name| {
        if name == ENV_SERVICE_URL && args.service_url.is_some() {
            return args.service_url.clone();
        }
        std::env::var(name).ok()
    })
    .map_err(|error| error.to_string())?;

    if let Some(username) = &args.username {
        config = config.with_credentials(username, args.password.clone().unwrap_or_default());
    }
    if args.no_succinct {
        config = config.with_succinct_properties(false);
    }
    if args.log_requests {
        config = config.with_log_requests(true);
    }
    config.validate().map_err(|error| error.to_string())?;
    Ok(config)
}

fn connect(args: &ConnectionArgs) -> Result<Server, String> {
    Server::new(build_config(args)?).map_err(|error| error.to_string())
}

async fn open_repository(args: &ConnectionArgs, repository_id: &str) -> Result<Repository, String> {
    connect(args)?
        .repository(repository_id)
        .await
        .map_err(|error| error.to_string())
}

async fn repositories_command(args: &ConnectionArgs) -> Result<ExitCode, String> {
    let repositories = connect(args)?
        .repositories()
        .await
        .map_err(|error| error.to_string())?;
    for repository in repositories {
        println!("{}\t{}", repository.id, repository.operation_url);
    }
    Ok(ExitCode::SUCCESS)
}

async fn info_command(args: &ConnectionArgs, info: RepositoryArgs) -> Result<ExitCode, String> {
    let repository = open_repository(args, &info.repository).await?;
    println!("id: {}", repository.id());
    println!("name: {}", repository.name().unwrap_or("-"));
    println!("description: {}", repository.description().unwrap_or("-"));
    println!(
        "product: {} {}",
        repository.product_name().unwrap_or("-"),
        repository.product_version().unwrap_or("")
    );
    println!("root_folder_id: {}", repository.root_folder_id());
    Ok(ExitCode::SUCCESS)
}

async fn get_command(args: &ConnectionArgs, get: GetArgs) -> Result<ExitCode, String> {
    let repository = open_repository(args, &get.repository).await?;
    let options = ObjectReadOptions {
        filter: get.filter,
        include_relationships: get.include_relationships,
        ..ObjectReadOptions::default()
    };
    let object = repository
        .get_object_with(&get.object_id, &options)
        .await
        .map_err(|error| error.to_string())?;

    if get.json {
        let body = properties_to_object_json(object.as_core().properties(), true);
        let rendered = serde_json::to_string_pretty(&body).map_err(|error| error.to_string())?;
        println!("{rendered}");
    } else {
        print_object(&object);
    }
    Ok(ExitCode::SUCCESS)
}

async fn children_command(args: &ConnectionArgs, children: ChildrenArgs) -> Result<ExitCode, String> {
    let repository = open_repository(args, &children.repository).await?;
    let folder_id = children
        .folder_id
        .unwrap_or_else(|| repository.root_folder_id().to_string());
    let folder = repository
        .get_object(&folder_id)
        .await
        .and_then(Folder::try_from)
        .map_err(|error| error.to_string())?;
    let page = folder
        .children_page(children.max_items, children.skip_count)
        .await
        .map_err(|error| error.to_string())?;

    for child in &page.objects {
        let core = child.as_core();
        println!(
            "{}\t{}\t{}",
            core.object_id().unwrap_or("-"),
            child.base_type().id(),
            core.name().unwrap_or("-")
        );
    }
    if page.has_more_items {
        println!("... more items available");
    }
    Ok(ExitCode::SUCCESS)
}

async fn create_document_command(
    args: &ConnectionArgs,
    create: CreateDocumentArgs,
) -> Result<ExitCode, String> {
    let content = match &create.file {
        Some(path) => Some(load_content(path, create.mime_type.as_deref())?),
        None => None,
    };

    let repository = open_repository(args, &create.repository).await?;
    let mut document = repository.new_document();
    document.set_name(&create.name);
    document.set_object_type_id(&create.type_id);
    if let Some((data, mime_type, filename)) = content {
        document
            .set_content(data, mime_type, filename)
            .map_err(|error| error.to_string())?;
    }

    let folder_id = create
        .folder_id
        .unwrap_or_else(|| repository.root_folder_id().to_string());
    let created: Document = document
        .create_in_folder(&folder_id)
        .await
        .map_err(|error| error.to_string())?;
    println!("created: {}", created.object_id().unwrap_or("-"));
    Ok(ExitCode::SUCCESS)
}

async fn delete_command(args: &ConnectionArgs, delete: DeleteArgs) -> Result<ExitCode, String> {
    let repository = open_repository(args, &delete.repository).await?;
    let object = repository
        .get_object(&delete.object_id)
        .await
        .map_err(|error| error.to_string())?;
    object
        .as_core()
        .delete()
        .await
        .map_err(|error| error.to_string())?;
    println!("deleted: {}", delete.object_id);
    Ok(ExitCode::SUCCESS)
}

async fn type_command(args: &ConnectionArgs, type_args: TypeArgs) -> Result<ExitCode, String> {
    let repository = open_repository(args, &type_args.repository).await?;
    let definition = repository
        .type_definition(&type_args.type_id)
        .await
        .map_err(|error| error.to_string())?;
    println!(
        "{} (base {}, creatable {}, fileable {})",
        definition.id, definition.base_id, definition.creatable, definition.fileable
    );
    for property in definition.property_definitions.values() {
        println!(
            "  {}\t{}\t{:?}\t{:?}{}",
            property.id,
            property.property_type.as_str(),
            property.cardinality,
            property.updatability,
            if property.required { "\trequired" } else { "" }
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn load_content(path: &Path, mime_type: Option<&str>) -> Result<(Vec<u8>, String, String), String> {
    let data = std::fs::read(path)
        .map_err(|error| format!("failed to read {}: {error}", path.display()))?;
    let mime_type = mime_type.map(str::to_string).unwrap_or_else(|| {
        mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    });
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| format!("{} has no file name", path.display()))?;
    Ok((data, mime_type, filename))
}

fn print_object(object: &CmisObject) {
    let core = object.as_core();
    println!("base_type: {}", object.base_type().id());
    for (id, value) in core.properties() {
        let rendered: Vec<String> = value.values().iter().map(|scalar| scalar.to_wire()).collect();
        println!("{id} = {}", rendered.join(", "));
    }
}
