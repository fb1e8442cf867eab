// src/common/i18n.rs

use std::collections::HashMap;
use std::sync::OnceLock;

// (código, espanhol, inglês, português)
const MESSAGES: &[(&str, &str, &str, &str)] = &[
    ("VALIDATION_ERROR", "Uno o más campos son inválidos.", "One or more fields are invalid.", "Um ou mais campos são inválidos."),
    ("MISSING_FIELD", "Falta un campo obligatorio.", "A required field is missing.", "Campo obrigatório ausente."),
    ("INVALID_TIME_RANGE", "La hora de término debe ser posterior a la de inicio.", "End time must be after start time.", "O horário de término deve ser posterior ao de início."),
    ("INVALID_SLOT_DURATION", "La duración del horario debe ser positiva.", "Slot duration must be positive.", "A duração do horário deve ser positiva."),
    ("INVALID_SNOOZE_DATE", "La fecha de posposición debe estar en el futuro.", "Snooze date must be in the future.", "A data de adiamento deve estar no futuro."),
    ("ZERO_AMOUNT", "El monto no puede ser cero.", "Amount cannot be zero.", "O valor não pode ser zero."),
    ("AMOUNT_SIGN_MISMATCH", "El signo del monto no corresponde al tipo de movimiento.", "Amount sign does not match the entry type.", "O sinal do valor não corresponde ao tipo de lançamento."),
    ("MISSING_EXCHANGE_RATE", "Los movimientos en USD requieren el tipo de cambio.", "USD entries require the exchange rate used.", "Lançamentos em USD exigem a taxa de câmbio."),
    ("UNEXPECTED_EXCHANGE_RATE", "El tipo de cambio solo aplica a movimientos en USD.", "Exchange rate is only allowed for USD entries.", "Taxa de câmbio só é permitida em USD."),
    ("MISSING_PAYMENT_METHOD", "Los pagos requieren método de pago.", "Payments require a payment method.", "Pagamentos exigem forma de pagamento."),
    ("UNEXPECTED_PAYMENT_METHOD", "Este tipo de movimiento no admite método de pago.", "This entry type does not accept a payment method.", "Este tipo de lançamento não aceita forma de pagamento."),
    ("INVALID_DOCTOR_FEE", "Datos del doctor inválidos para el cargo de servicio.", "Invalid doctor data for the service charge.", "Dados do médico inválidos para o serviço."),
    ("INVALID_LINE_ITEM", "Cantidad o precio unitario inválido.", "Invalid quantity or unit price.", "Quantidade ou preço unitário inválido."),
    ("INVALID_CORRECTION", "Corrección inválida.", "Invalid correction.", "Correção inválida."),
    ("INVALID_STARTING_FLOAT", "El fondo de caja inicial no puede ser negativo.", "Starting float cannot be negative.", "O fundo de troco não pode ser negativo."),
    ("INVALID_RECONCILIATION_AMOUNTS", "Montos de corte de caja inválidos.", "Invalid reconciliation amounts.", "Valores de corte inválidos."),
    ("APPOINTMENT_CONFLICT", "El horario se traslapa con otra cita.", "The time slot overlaps another appointment.", "O horário conflita com outra consulta."),
    ("CASH_SESSION_ALREADY_OPEN", "Ya existe una caja abierta para este usuario en esta clínica.", "A cash session is already open for this user at this clinic.", "Já existe um caixa aberto para este usuário nesta clínica."),
    ("RECONCILIATION_ALREADY_EXISTS", "Ya existe un corte para este método y moneda.", "A reconciliation already exists for this method and currency.", "Já existe um corte para esta forma e moeda."),
    ("APPOINTMENT_NOT_FOUND", "Cita no encontrada.", "Appointment not found.", "Consulta não encontrada."),
    ("DOCTOR_NOT_FOUND", "Doctor no encontrado.", "Doctor not found.", "Médico não encontrado."),
    ("UNIT_NOT_FOUND", "Unidad no encontrada.", "Unit not found.", "Unidade não encontrada."),
    ("PATIENT_NOT_FOUND", "Paciente no encontrado.", "Patient not found.", "Paciente não encontrado."),
    ("CLINIC_NOT_FOUND", "Clínica no encontrada.", "Clinic not found.", "Clínica não encontrada."),
    ("CASH_SESSION_NOT_FOUND", "Caja no encontrada.", "Cash session not found.", "Caixa não encontrado."),
    ("ENTRY_NOT_FOUND", "Movimiento no encontrado.", "Ledger entry not found.", "Lançamento não encontrado."),
    ("RECONCILIATION_NOT_FOUND", "Corte de caja no encontrado.", "Reconciliation not found.", "Corte de caixa não encontrado."),
    ("APPOINTMENT_NOT_IN_QUEUE", "La cita no está en la cola de reprogramación.", "The appointment is not in the rescheduling queue.", "A consulta não está na fila de reagendamento."),
    ("INVALID_STATUS_TRANSITION", "Cambio de estado no permitido.", "Status transition not allowed.", "Transição de status não permitida."),
    ("CASH_SESSION_ALREADY_CLOSED", "La caja ya está cerrada.", "The cash session is already closed.", "O caixa já está fechado."),
    ("CASH_SESSION_NOT_OPEN", "La caja está cerrada.", "The cash session is closed.", "O caixa está fechado."),
    ("CASH_SESSION_UNRECONCILED", "Faltan cortes de caja antes de cerrar.", "Reconciliations are missing before closing.", "Faltam cortes de caixa antes de fechar."),
    ("RECONCILIATION_ALREADY_DISPUTED", "El corte ya está en disputa.", "The reconciliation is already disputed.", "O corte já está em disputa."),
    ("INVALID_TOKEN", "Token de autenticación inválido o ausente.", "Invalid or missing authentication token.", "Token de autenticação inválido ou ausente."),
    ("FORBIDDEN", "No tiene permiso para esta acción.", "You are not allowed to perform this action.", "Você não tem permissão para esta ação."),
    ("INTERNAL_ERROR", "Ocurrió un error inesperado.", "An unexpected error occurred.", "Ocorreu um erro inesperado."),
];

/// Mensagens de erro por idioma, indexadas pelo código estável do erro.
#[derive(Debug, Clone)]
pub struct I18nStore {
    messages: HashMap<&'static str, [&'static str; 3]>,
}

impl I18nStore {
    pub fn new() -> Self {
        let messages = MESSAGES
            .iter()
            .map(|(code, es, en, pt)| (*code, [*es, *en, *pt]))
            .collect();
        Self { messages }
    }

    /// Instância compartilhada para quem não recebe o `AppState` (middlewares).
    pub fn global() -> &'static I18nStore {
        static STORE: OnceLock<I18nStore> = OnceLock::new();
        STORE.get_or_init(I18nStore::new)
    }

    pub fn translate(&self, lang: &str, code: &str) -> String {
        let index = match lang {
            "es" => 0,
            "pt" => 2,
            _ => 1, // "en"
        };
        self.messages
            .get(code)
            .map(|m| m[index].to_string())
            .unwrap_or_else(|| code.to_string())
    }
}

impl Default for I18nStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_english_for_unknown_language() {
        let store = I18nStore::new();
        assert_eq!(store.translate("de", "ZERO_AMOUNT"), "Amount cannot be zero.");
        assert_eq!(store.translate("es", "ZERO_AMOUNT"), "El monto no puede ser cero.");
    }

    #[test]
    fn unknown_code_is_returned_verbatim() {
        assert_eq!(I18nStore::new().translate("en", "NOPE"), "NOPE");
    }
}
