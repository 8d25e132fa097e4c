//! FILENAME: app/src/fixtures.rs
// PURPOSE: Built-in demo dataset and default pivot layout.
// CONTEXT: Twenty payable/receivable entries between March and May 2025,
// used by the CLI `--demo` mode and by tests.

use engine::Record;

use crate::pivot::types::{MeasureRequest, PivotRequest};

pub const CONTAS_A_PAGAR: &str = "Contas a Pagar";
pub const CONTAS_A_RECEBER: &str = "Contas a Receber";

type DemoRow = (
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    f64,
    f64,
    &'static str,
    &'static str,
);

// (dataPrevisao, clienteFornecedor, telefone, tipo, valorConta, aPagarReceber, banco, agencia)
const DEMO_ROWS: [DemoRow; 20] = [
    ("2025-03-23", "BANCO DO BRASIL", "(35) 9851-0000", CONTAS_A_PAGAR, -622.94, -622.94, "Banco do Brasil", "1234-5"),
    ("2025-03-24", "Cliente ABC Ltda", "(11) 99999-1234", CONTAS_A_RECEBER, 55724.87, 32185.75, "Itaú", "0567-8"),
    ("2025-03-24", "Fornecedor XYZ", "(21) 3333-4444", CONTAS_A_PAGAR, -19867.40, -19867.40, "Bradesco", "2345-6"),
    ("2025-03-26", "CEMIG Distribuição", "(31) 116", CONTAS_A_PAGAR, -1041.80, -1041.80, "Caixa", "0001"),
    ("2025-03-27", "Empresa Tech Solutions", "(11) 4002-8922", CONTAS_A_RECEBER, 28500.00, 28500.00, "Santander", "7890-1"),
    ("2025-03-28", "Locadora de Veículos SA", "(31) 3245-6789", CONTAS_A_PAGAR, -3250.00, -3250.00, "Banco do Brasil", "4567-8"),
    ("2025-04-02", "Cliente Premium LTDA", "(19) 98765-4321", CONTAS_A_RECEBER, 42800.00, 42800.00, "Itaú", "1234-5"),
    ("2025-04-05", "Copasa MG", "(31) 115", CONTAS_A_PAGAR, -456.78, -456.78, "Caixa", "0001"),
    ("2025-04-08", "Distribuidora Nacional", "(11) 2222-3333", CONTAS_A_PAGAR, -15680.50, -15680.50, "Bradesco", "5678-9"),
    ("2025-04-10", "Consultoria Empresarial", "(21) 99887-6655", CONTAS_A_RECEBER, 18900.00, 18900.00, "Banco do Brasil", "9012-3"),
    ("2025-04-12", "Operadora Telecom", "(0800) 123-4567", CONTAS_A_PAGAR, -890.00, -890.00, "Itaú", "3456-7"),
    ("2025-04-15", "Indústria Metalúrgica", "(35) 3456-7890", CONTAS_A_RECEBER, 67500.00, 45000.00, "Santander", "2345-6"),
    ("2025-04-18", "Gráfica Impressa", "(31) 3111-2222", CONTAS_A_PAGAR, -2340.00, -2340.00, "Caixa", "0023"),
    ("2025-04-20", "Supermercado Atacadão", "(11) 4444-5555", CONTAS_A_PAGAR, -5678.90, -5678.90, "Bradesco", "8901-2"),
    ("2025-05-02", "Comercial Alimentos", "(19) 3333-4444", CONTAS_A_RECEBER, 33250.00, 33250.00, "Itaú", "6789-0"),
    ("2025-05-05", "Seguradora Nacional", "(11) 3030-4040", CONTAS_A_PAGAR, -4500.00, -4500.00, "Banco do Brasil", "1111-1"),
    ("2025-05-10", "Loja Virtual Online", "(21) 5555-6666", CONTAS_A_RECEBER, 12890.50, 12890.50, "Nubank", "0001"),
    ("2025-05-15", "Transportadora Rápida", "(35) 9999-8888", CONTAS_A_PAGAR, -8760.00, -8760.00, "Santander", "4321-0"),
    ("2025-05-20", "Escritório Contábil", "(31) 7777-8888", CONTAS_A_PAGAR, -1850.00, -1850.00, "Itaú", "5432-1"),
    ("2025-05-25", "Fábrica de Móveis", "(19) 2222-1111", CONTAS_A_RECEBER, 89000.00, 62300.00, "Bradesco", "6543-2"),
];

pub fn demo_records() -> Vec<Record> {
    DEMO_ROWS
        .iter()
        .map(
            |&(data, cliente, telefone, tipo, valor, a_pagar_receber, banco, agencia)| {
                Record::new()
                    .with("dataPrevisao", data)
                    .with("clienteFornecedor", cliente)
                    .with("telefone", telefone)
                    .with("tipo", tipo)
                    .with("valorConta", valor)
                    .with("aPagarReceber", a_pagar_receber)
                    .with("banco", banco)
                    .with("agencia", agencia)
            },
        )
        .collect()
}

/// Rows by forecast date, columns by entry type, summing both amounts.
pub fn default_pivot_request() -> PivotRequest {
    PivotRequest {
        row_fields: vec!["dataPrevisao".to_string()],
        column_field: Some("tipo".to_string()),
        measures: vec![
            MeasureRequest::new("valorConta"),
            MeasureRequest::new("aPagarReceber"),
        ],
        ..PivotRequest::default()
    }
}
