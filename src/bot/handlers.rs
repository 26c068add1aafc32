use anyhow::Result;
use serenity::{
    builder::{CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse},
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::{info, warn};

use crate::{bot::JukeboxBot, ui::embeds};

/// Maneja comandos slash
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &JukeboxBot,
) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "play" => handle_play(ctx, &command, bot, guild_id).await?,
        "pause" => handle_pause(ctx, &command, bot, guild_id).await?,
        "resume" => handle_resume(ctx, &command, bot, guild_id).await?,
        "skip" => handle_skip(ctx, &command, bot, guild_id).await?,
        "stop" => handle_stop(ctx, &command, bot, guild_id).await?,
        "queue" => handle_queue(ctx, &command, bot, guild_id).await?,
        _ => {
            command
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new()
                            .content("❌ Unknown command")
                            .ephemeral(true),
                    ),
                )
                .await?;
        }
    }

    Ok(())
}

// Handlers específicos para cada comando

async fn handle_play(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let query = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "query")
        .and_then(|opt| opt.value.as_str())
        .ok_or_else(|| anyhow::anyhow!("Query no proporcionado"))?;

    // Verificar que el usuario esté en un canal de voz
    let Some(voice_channel_id) = get_user_voice_channel(ctx, guild_id, command.user.id) else {
        return reply(ctx, command, embeds::NOT_IN_VOICE).await;
    };

    // Defer la respuesta ya que puede tomar tiempo
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    // Conectar al canal de voz si no está conectado
    if !bot.player.is_connected(guild_id).await {
        if let Err(e) = bot.player.join(guild_id, voice_channel_id).await {
            warn!("No se pudo conectar en guild {}: {}", guild_id, e);
            return edit_reply(ctx, command, &format!("❌ {}", e)).await;
        }
    }

    let track = match bot.resolver.resolve(query).await {
        Ok(track) => track,
        Err(e) => {
            warn!("No se pudo resolver '{}': {}", query, e);
            return edit_reply(ctx, command, &format!("❌ {}", e)).await;
        }
    };

    let content = match bot.player.enqueue_and_maybe_play(guild_id, track).await {
        Ok(outcome) if outcome.started => embeds::now_playing_message(&outcome.track),
        Ok(outcome) => embeds::added_to_queue_message(&outcome.track),
        Err(e) => format!("❌ {}", e),
    };

    edit_reply(ctx, command, &content).await
}

async fn handle_pause(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    match bot.player.pause(guild_id).await {
        Ok(()) => reply(ctx, command, embeds::PAUSED).await,
        Err(e) => reply(ctx, command, &e.to_string()).await,
    }
}

async fn handle_resume(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    match bot.player.resume(guild_id).await {
        Ok(()) => reply(ctx, command, embeds::RESUMED).await,
        Err(e) => reply(ctx, command, &e.to_string()).await,
    }
}

async fn handle_skip(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    match bot.player.skip(guild_id).await {
        Ok(next) => reply(ctx, command, &embeds::skipped_message(next.as_ref())).await,
        Err(e) => reply(ctx, command, &e.to_string()).await,
    }
}

async fn handle_stop(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    match bot.player.stop_and_leave(guild_id).await {
        Ok(()) => reply(ctx, command, embeds::STOPPED).await,
        Err(e) => reply(ctx, command, &e.to_string()).await,
    }
}

async fn handle_queue(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let queue_info = bot.player.queue_snapshot(guild_id).await;

    let Some(embed) = embeds::create_queue_embed(&queue_info, bot.config.queue_page_size) else {
        return reply(ctx, command, embeds::EMPTY_QUEUE).await;
    };

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().embed(embed),
            ),
        )
        .await?;

    Ok(())
}

// Funciones auxiliares

async fn reply(ctx: &Context, command: &CommandInteraction, content: &str) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().content(content),
            ),
        )
        .await?;

    Ok(())
}

async fn edit_reply(ctx: &Context, command: &CommandInteraction, content: &str) -> Result<()> {
    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(content))
        .await?;

    Ok(())
}

fn get_user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;

    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}
