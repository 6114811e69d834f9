use tracing::info;

use crate::{
    dao::models::SaveEntity,
    dto::{
        game_state::GameState,
        push::{NewChanges, PushEvent},
        save::{SaveRecord, SaveResponse},
    },
    error::ServiceError,
    state::SharedState,
};

/// Store a new save and broadcast it to every push socket.
pub async fn save_game(state: &SharedState, data: GameState) -> Result<SaveResponse, ServiceError> {
    let entity = SaveEntity::new(data);
    state.save_store().insert(entity.clone()).await?;

    info!(id = %entity.id, players = entity.data.players.len(), "game saved");
    state
        .push()
        .hub()
        .broadcast(PushEvent::NewChanges(NewChanges {
            data: entity.data.clone(),
        }));

    SaveResponse::try_from(entity)
        .map_err(|err| ServiceError::Internal(format!("failed to encode save: {err}")))
}

/// Every save, most recent first.
pub async fn list_saves(state: &SharedState) -> Result<Vec<SaveRecord>, ServiceError> {
    let saves = state.save_store().list().await?;
    Ok(saves.into_iter().map(SaveRecord::from).collect())
}

/// Most recent save.
pub async fn last_save(state: &SharedState) -> Result<SaveResponse, ServiceError> {
    let entity = state
        .save_store()
        .last()
        .await?
        .ok_or_else(|| ServiceError::NotFound("no save yet".into()))?;

    SaveResponse::try_from(entity)
        .map_err(|err| ServiceError::Internal(format!("failed to encode save: {err}")))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{dao::save_store::MemorySaveStore, dto::game_state::Proposition, state::AppState};

    fn state_with(text: &str) -> GameState {
        GameState {
            players: Vec::new(),
            propositions: vec![Proposition {
                id: "1".into(),
                text: text.into(),
            }],
        }
    }

    #[tokio::test]
    async fn save_is_listed_and_broadcast() {
        let state = AppState::new(Arc::new(MemorySaveStore::new()));
        let mut events = state.push().hub().subscribe();

        let response = save_game(&state, state_with("first")).await.unwrap();
        assert_eq!(
            response.game_state().unwrap(),
            Some(state_with("first"))
        );

        match events.recv().await.unwrap() {
            PushEvent::NewChanges(changes) => assert_eq!(changes.data, state_with("first")),
            other => panic!("unexpected event {other:?}"),
        }

        save_game(&state, state_with("second")).await.unwrap();
        let saves = list_saves(&state).await.unwrap();
        assert_eq!(saves.len(), 2);
        assert_eq!(saves[0].data, state_with("second"));

        let last = last_save(&state).await.unwrap();
        assert_eq!(last.game_state().unwrap(), Some(state_with("second")));
    }

    #[tokio::test]
    async fn last_save_on_empty_store_is_not_found() {
        let state = AppState::new(Arc::new(MemorySaveStore::new()));
        assert!(matches!(
            last_save(&state).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
