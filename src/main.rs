use cinestream::cache::{
  DefaultController, HttpNetwork, Request, ResourceCacheController, ResponseSource,
  SqliteCacheStorage,
};
use cinestream::catalog::{CatalogClient, MovieId, SortBy};
use cinestream::config::Config;
use cinestream::db::Database;
use cinestream::favorites::{
  AccountDocumentStore, DisabledDocumentStore, FavoritesCollection, FavoritesStore,
  HttpDocumentStore, Identity, SqliteLocalStorage,
};
use cinestream::identity::{AccountProfile, FavoritesSession, IdentityFeed};
use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "cinestream")]
#[command(about = "Movie favorites with account sync and an offline cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/cinestream/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Also log to stderr
  #[arg(short, long)]
  verbose: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Manage saved movies
  Favorites {
    #[command(subcommand)]
    action: FavoritesAction,
  },
  /// Sign in and merge this device's favorites into the account
  Login {
    account_id: String,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    name: Option<String>,
  },
  /// Search or browse the catalog
  Search {
    query: Option<String>,
    #[arg(long, default_value_t = 1)]
    page: u32,
    #[arg(long, value_enum, default_value_t = SortArg::Popularity)]
    sort: SortArg,
  },
  /// Run one request through the resource cache
  Fetch {
    url: String,
    /// Treat the request as a page navigation
    #[arg(long)]
    navigate: bool,
  },
  /// Inspect or maintain the resource cache
  Cache {
    #[command(subcommand)]
    action: CacheAction,
  },
}

#[derive(Subcommand, Debug)]
enum FavoritesAction {
  List {
    #[arg(long)]
    account: Option<String>,
  },
  Add {
    movie_id: MovieId,
    #[arg(long)]
    account: Option<String>,
  },
  Remove {
    movie_id: MovieId,
    #[arg(long)]
    account: Option<String>,
  },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
  /// Precache the app shell into the current generation
  Install,
  /// Delete stale generations
  Activate,
  /// List cache generations
  List,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SortArg {
  Popularity,
  Rating,
  Released,
}

impl From<SortArg> for SortBy {
  fn from(arg: SortArg) -> Self {
    match arg {
      SortArg::Popularity => SortBy::Popularity,
      SortArg::Rating => SortBy::Rating,
      SortArg::Released => SortBy::ReleaseDate,
    }
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let _log_guard = cinestream::logging::init(&Database::data_dir()?.join("logs"), args.verbose)?;

  // Load configuration
  let config = Config::load(args.config.as_deref())?;

  match args.command {
    Command::Favorites { action } => run_favorites(&config, action).await,
    Command::Login {
      account_id,
      email,
      name,
    } => {
      let profile = AccountProfile {
        account_id,
        email,
        display_name: name,
        photo_url: None,
      };
      run_login(&config, profile).await
    }
    Command::Search { query, page, sort } => {
      let catalog = catalog_client(&config).await?;
      let results = catalog
        .fetch_movies(
          query.as_deref().unwrap_or(""),
          page,
          sort.into(),
          &config.catalog.language,
        )
        .await?;
      for movie in &results.results {
        println!("{:>8}  {}  ({})", movie.id, movie.title, movie.release_date);
      }
      println!("page {} of {}", page, results.total_pages);
      Ok(())
    }
    Command::Fetch { url, navigate } => {
      let controller = controller(&config)?;
      controller.ensure_active().await?;

      let url = config.resolve(&url)?;
      let request = if navigate {
        Request::navigate(url)
      } else {
        Request::get(url)
      };

      let served = controller.fetch(&request).await?;
      let source = match served.source {
        ResponseSource::Network => "network",
        ResponseSource::Cache => "cache",
        ResponseSource::OfflinePage => "offline page",
        ResponseSource::Unavailable => "unavailable",
      };
      match served.response {
        Some(response) => println!(
          "{} {} ({} bytes) from {}",
          response.status,
          request.url,
          response.body.len(),
          source
        ),
        None => println!("{} {}", source, request.url),
      }
      Ok(())
    }
    Command::Cache { action } => {
      let controller = controller(&config)?;
      match action {
        CacheAction::Install => {
          controller.install().await?;
          println!("installed {}", controller.generation());
        }
        CacheAction::Activate => {
          controller.ensure_active().await?;
          println!("active generation {}", controller.generation());
        }
        CacheAction::List => {
          for name in controller.generations()? {
            let marker = if name == controller.generation() { "*" } else { " " };
            println!("{} {}", marker, name);
          }
        }
      }
      Ok(())
    }
  }
}

fn controller(config: &Config) -> Result<DefaultController> {
  ResourceCacheController::new(SqliteCacheStorage::open()?, HttpNetwork::new()?, config)
}

async fn catalog_client(
  config: &Config,
) -> Result<CatalogClient<SqliteCacheStorage, HttpNetwork>> {
  let controller = controller(config)?;
  controller.ensure_active().await?;
  Ok(CatalogClient::new(controller, config, Config::get_catalog_key()?))
}

fn document_store(config: &Config) -> Result<Arc<dyn AccountDocumentStore>> {
  match config.account.document_url.as_deref() {
    Some(url) => Ok(Arc::new(HttpDocumentStore::new(
      url,
      Config::get_account_token(),
    )?)),
    None => Ok(Arc::new(DisabledDocumentStore)),
  }
}

fn favorites_store(config: &Config, account: Option<&str>) -> Result<Arc<FavoritesStore>> {
  if account.is_some() && config.account.document_url.is_none() {
    return Err(eyre!(
      "No account document store configured (account.document_url)"
    ));
  }

  let local = Arc::new(SqliteLocalStorage::open()?);
  Ok(Arc::new(FavoritesStore::new(local, document_store(config)?)))
}

/// Restore the session for `account` (or the anonymous device state).
async fn restore(store: &Arc<FavoritesStore>, account: Option<String>) -> Result<()> {
  let (feed, subscription) = IdentityFeed::new();
  let session = FavoritesSession::start(Arc::clone(store), subscription);
  feed.publish(account.map(AccountProfile::new));
  drop(feed);
  session.finish().await
}

async fn run_favorites(config: &Config, action: FavoritesAction) -> Result<()> {
  let account = match &action {
    FavoritesAction::List { account }
    | FavoritesAction::Add { account, .. }
    | FavoritesAction::Remove { account, .. } => account.clone(),
  };
  let store = favorites_store(config, account.as_deref())?;

  match action {
    FavoritesAction::List { account } => {
      restore(&store, account).await?;
    }
    FavoritesAction::Add { movie_id, account } => {
      restore(&store, account).await?;
      let catalog = catalog_client(config).await?;
      let details = catalog
        .fetch_movie_details(movie_id, &config.catalog.language)
        .await?;
      store.add_to_favorites(details.movie).await;
    }
    FavoritesAction::Remove { movie_id, account } => {
      restore(&store, account).await?;
      store.remove_from_favorites(movie_id).await;
    }
  }

  print_favorites(&store.identity(), &store.favorites());
  Ok(())
}

async fn run_login(config: &Config, profile: AccountProfile) -> Result<()> {
  let store = favorites_store(config, Some(&profile.account_id))?;

  let (feed, subscription) = IdentityFeed::new();
  let session = FavoritesSession::start(Arc::clone(&store), subscription);
  feed.sign_out();
  feed.sign_in(profile);
  drop(feed);

  let profile = session.watch_profile();
  session.finish().await?;

  if let Some(profile) = profile.borrow().as_ref() {
    let name = profile
      .display_name
      .as_deref()
      .or(profile.email.as_deref())
      .unwrap_or(&profile.account_id);
    println!("signed in as {}", name);
  }
  print_favorites(&store.identity(), &store.favorites());
  Ok(())
}

fn print_favorites(identity: &Identity, favorites: &FavoritesCollection) {
  let owner = identity.account_id().unwrap_or("this device");
  if favorites.is_empty() {
    println!("no favorites for {}", owner);
    return;
  }
  println!("{} favorites for {}:", favorites.len(), owner);
  for movie in favorites {
    println!("{:>8}  {}", movie.id, movie.title);
  }
}
