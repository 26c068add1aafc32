use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use jukebox::{
    api::{self, ApiState},
    audio::{
        driver::SongbirdTransport, player::PlaybackCoordinator, queue::QueueRegistry,
        voice::SessionRegistry,
    },
    bot::JukeboxBot,
    config::Config,
    sources::{Resolver, YtDlpResolver},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("jukebox=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Jukebox v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Config::load()?;

    // Manejar health check si es necesario
    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check(&config).await;
    }

    info!("{}", config.summary());
    let config = Arc::new(config);

    let resolver: Arc<dyn Resolver> = Arc::new(YtDlpResolver::new(
        config.ytdlp_path.clone(),
        config.youtube_api_key.clone(),
    ));

    // Songbird compartido entre el gateway y el transporte de audio
    let songbird = Songbird::serenity();
    let transport = Arc::new(SongbirdTransport::new(songbird.clone()));
    let player = PlaybackCoordinator::new(
        Arc::new(QueueRegistry::new()),
        Arc::new(SessionRegistry::new(transport)),
    );

    // Configurar intents mínimos necesarios
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    let handler = JukeboxBot::new(config.clone(), player.clone(), resolver.clone());

    // Construir cliente
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    // Iniciar API HTTP
    let shutdown = CancellationToken::new();
    let api_state = Arc::new(ApiState {
        player,
        resolver,
        search_limit: config.search_limit,
    });
    let api_addr = config.api_addr();
    let api_shutdown = shutdown.clone();
    let api_task = tokio::spawn(async move {
        if let Err(e) = api::serve(&api_addr, api_state, api_shutdown).await {
            error!("Error en la API HTTP: {:?}", e);
        }
    });

    // Manejar shutdown graceful
    let shard_manager = client.shard_manager.clone();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error al registrar Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        signal_shutdown.cancel();
        shard_manager.shutdown_all().await;
    });

    // Iniciar bot
    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    shutdown.cancel();
    if let Err(e) = api_task.await {
        error!("La tarea de la API terminó con error: {:?}", e);
    }

    Ok(())
}

async fn health_check(config: &Config) -> Result<()> {
    // Verificar dependencias críticas
    let resolver = YtDlpResolver::new(config.ytdlp_path.clone(), None);

    match resolver.verify().await {
        Ok(version) => {
            info!("yt-dlp {}", version);
            println!("OK");
            Ok(())
        }
        Err(e) => anyhow::bail!("Dependencias faltantes: {}", e),
    }
}
