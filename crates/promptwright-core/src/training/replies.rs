//! User-facing reply texts for the training flow.

use promptwright_types::message::Reply;
use promptwright_types::training::Modification;

/// Shown when no text could be extracted from the inbound message.
pub const RETRY_MESSAGE: &str =
    "Hubo un error al procesar el mensaje. Por favor, intenta nuevamente.";

/// Shown when a training turn fails on a store error.
pub const FAILURE_MESSAGE: &str = "Ha ocurrido un error. Por favor, intenta de nuevo.";

/// Returned by the responder when the oracle call fails.
pub const RESPONDER_APOLOGY: &str =
    "Lo siento, ha ocurrido un error. ¿Podrías repetir tu mensaje?";

/// Block emitted when a session enters training.
pub fn welcome_block(exit_keyword: &str) -> Reply {
    Reply::Block(vec![
        "🤖 *Modo de Entrenamiento Iniciado*".to_string(),
        String::new(),
        "Puedes interactuar normalmente con el bot o sugerir modificaciones.".to_string(),
        format!("Para salir, simplemente escribe \"{exit_keyword}\"."),
        String::new(),
        "¿En qué puedo ayudarte?".to_string(),
    ])
}

/// Block emitted when a session leaves training.
pub fn exit_block() -> Reply {
    Reply::Block(vec![
        "✅ Entrenamiento finalizado.".to_string(),
        "Todas las modificaciones han sido guardadas.".to_string(),
        "¡Hasta pronto!".to_string(),
    ])
}

/// Block shown to the user after a modification was recorded.
pub fn modification_ack_block(modification: &Modification) -> Reply {
    Reply::Block(vec![
        "✅ He detectado una sugerencia de modificación:".to_string(),
        format!("**Tipo:** {}", modification.modification_type),
        format!("**Descripción:** {}", modification.description),
        String::new(),
        "La modificación ha sido registrada. ¿Hay algo más en lo que pueda ayudarte?".to_string(),
    ])
}

/// Assistant entry appended to the conversation buffer after a modification.
pub fn acknowledgment_entry(modification: &Modification) -> String {
    format!("Modificación registrada: {}", modification.description)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_welcome_mentions_exit_keyword() {
        let rendered = welcome_block("salir").render();
        assert!(rendered.starts_with("🤖 *Modo de Entrenamiento Iniciado*"));
        assert!(rendered.contains("escribe \"salir\""));
    }

    #[test]
    fn test_ack_block_carries_type_and_description() {
        let m = Modification::new("hours", "Closed Mondays");
        let Reply::Block(lines) = modification_ack_block(&m) else {
            panic!("expected a block");
        };
        assert_eq!(lines[1], "**Tipo:** hours");
        assert_eq!(lines[2], "**Descripción:** Closed Mondays");
        assert_eq!(acknowledgment_entry(&m), "Modificación registrada: Closed Mondays");
    }
}
