use std::{future::IntoFuture, process, sync::Arc, time::Duration};

use quill::{
    application::{
        accounts::{AccountService, NewGroup},
        error::AppError,
        feed::FeedService,
        follows::FollowService,
        posts::PostService,
        repos::Repositories,
    },
    cache::{CacheConfig, CacheState},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, AdminState, AuthState, HttpState},
        media::MediaStorage,
        memory::InMemoryRepositories,
        telemetry,
    },
};
use tokio::{sync::watch, try_join};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Users(args) => run_users(settings, args).await,
        config::Command::Groups(args) => run_groups(settings, args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let store = init_store(&settings, false).await?;
    let app = build_application_context(store, &settings)?;
    serve_http(&settings, app.http_state, app.admin_state).await
}

async fn run_users(settings: config::Settings, args: config::UsersArgs) -> Result<(), AppError> {
    let accounts = build_account_service(&settings).await?;
    match args.command {
        config::UsersCommand::Create { username } => {
            let user = accounts.create_user(&username).await?;
            info!(
                target = "quill::users",
                user_id = user.id,
                username = %user.username,
                "user created"
            );
        }
        config::UsersCommand::Delete { username } => {
            accounts.delete_user(&username).await?;
            info!(target = "quill::users", username = %username, "user deleted");
        }
    }
    Ok(())
}

async fn run_groups(settings: config::Settings, args: config::GroupsArgs) -> Result<(), AppError> {
    let accounts = build_account_service(&settings).await?;
    match args.command {
        config::GroupsCommand::Create {
            title,
            slug,
            description,
        } => {
            let group = accounts
                .create_group(NewGroup {
                    title,
                    slug,
                    description,
                })
                .await?;
            info!(
                target = "quill::groups",
                group_id = group.id,
                slug = %group.slug,
                "group created"
            );
        }
        config::GroupsCommand::Delete { slug } => {
            accounts.delete_group(&slug).await?;
            info!(target = "quill::groups", slug = %slug, "group deleted");
        }
    }
    Ok(())
}

/// Repositories plus the Postgres handle used for health checks, if any.
struct Store {
    repositories: Repositories,
    postgres: Option<Arc<PostgresRepositories>>,
}

async fn init_store(settings: &config::Settings, require_database: bool) -> Result<Store, AppError> {
    let Some(database_url) = settings.database.url.as_ref() else {
        if require_database {
            return Err(AppError::from(InfraError::configuration(
                "database url is not configured; this command needs persistent storage",
            )));
        }
        warn!(
            target = "quill::bootstrap",
            "database url is not configured; using the in-process store, data is lost on exit"
        );
        return Ok(Store {
            repositories: Repositories::from_store(Arc::new(InMemoryRepositories::new())),
            postgres: None,
        });
    };

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    let postgres = Arc::new(PostgresRepositories::new(pool));
    Ok(Store {
        repositories: Repositories::from_store(postgres.clone()),
        postgres: Some(postgres),
    })
}

fn init_media(settings: &config::Settings) -> Result<Arc<MediaStorage>, AppError> {
    MediaStorage::new(settings.media.directory.clone())
        .map(Arc::new)
        .map_err(|err| AppError::from(InfraError::Io(err)))
}

async fn build_account_service(settings: &config::Settings) -> Result<AccountService, AppError> {
    let store = init_store(settings, true).await?;
    let media = init_media(settings)?;
    let repos = store.repositories;
    Ok(AccountService::new(
        repos.users,
        repos.users_write,
        repos.groups,
        repos.groups_write,
        media,
    ))
}

struct ApplicationContext {
    http_state: HttpState,
    admin_state: AdminState,
}

fn build_application_context(
    store: Store,
    settings: &config::Settings,
) -> Result<ApplicationContext, AppError> {
    let Store {
        repositories: repos,
        postgres,
    } = store;
    let media = init_media(settings)?;

    let follows = FollowService::new(repos.follows.clone());
    let feed = Arc::new(FeedService::new(
        repos.users.clone(),
        repos.groups.clone(),
        repos.posts.clone(),
        repos.comments.clone(),
        follows.clone(),
    ));
    let posts = Arc::new(PostService::new(
        repos.users.clone(),
        repos.groups.clone(),
        repos.posts.clone(),
        repos.posts_write.clone(),
        repos.comments.clone(),
        media.clone(),
    ));

    let cache_state = if settings.cache.enabled {
        Some(CacheState::new(CacheConfig::from(&settings.cache)))
    } else {
        info!(target = "quill::bootstrap", "index response cache disabled");
        None
    };

    let http_state = HttpState {
        feed,
        follows,
        posts,
        media,
        auth: AuthState::new(repos.users.clone(), &settings.auth),
        cache: cache_state.clone(),
    };
    let admin_state = AdminState {
        cache: cache_state,
        db: postgres,
    };

    Ok(ApplicationContext {
        http_state,
        admin_state,
    })
}

async fn serve_http(
    settings: &config::Settings,
    http_state: HttpState,
    admin_state: AdminState,
) -> Result<(), AppError> {
    let max_request_bytes = usize::try_from(settings.media.max_request_bytes.get())
        .unwrap_or(usize::MAX);
    let public_router = http::build_router(http_state, max_request_bytes);
    let admin_router = http::build_admin_router(admin_state);

    let public_listener = tokio::net::TcpListener::bind(settings.server.public_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    let admin_listener = tokio::net::TcpListener::bind(settings.server.admin_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "quill::bootstrap",
        public = %settings.server.public_addr,
        admin = %settings.server.admin_addr,
        "listening"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let public_server = axum::serve(public_listener, public_router.into_make_service())
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx.clone()))
        .into_future();
    let admin_server = axum::serve(admin_listener, admin_router.into_make_service())
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx))
        .into_future();

    let servers = async { try_join!(public_server, admin_server) };
    tokio::pin!(servers);

    tokio::select! {
        result = &mut servers => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        () = shutdown_signal() => {
            info!(target = "quill::bootstrap", "shutdown requested; draining connections");
            let _ = shutdown_tx.send(true);
            drain(servers, settings.server.graceful_shutdown).await?;
        }
    }

    Ok(())
}

async fn drain<F>(servers: F, grace: Duration) -> Result<(), AppError>
where
    F: std::future::Future<Output = Result<((), ()), std::io::Error>>,
{
    match tokio::time::timeout(grace, servers).await {
        Ok(result) => result
            .map(|_| ())
            .map_err(|err| AppError::unexpected(format!("server error: {err}"))),
        Err(_) => {
            warn!(
                target = "quill::bootstrap",
                grace_seconds = grace.as_secs(),
                "graceful shutdown timed out; dropping open connections"
            );
            Ok(())
        }
    }
}

async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = terminate.recv() => {},
                }
            }
            Err(err) => {
                warn!(target = "quill::bootstrap", error = %err, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
