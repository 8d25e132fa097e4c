use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use engine::{FieldCatalog, Record};
use pivot_engine::{aggregate, PivotConfig};

const TIPOS: [&str; 2] = ["Contas a Pagar", "Contas a Receber"];
const BANCOS: [&str; 6] = ["Banco do Brasil", "Itaú", "Bradesco", "Caixa", "Santander", "Nubank"];

fn build_records(rows: usize) -> Vec<Record> {
    (0..rows)
        .map(|i| {
            let day = 1 + (i % 28) as u32;
            let month = 1 + (i / 28 % 12) as u32;
            let sign = if i % 2 == 0 { -1.0 } else { 1.0 };
            Record::new()
                .with("dataPrevisao", format!("2025-{:02}-{:02}", month, day))
                .with("tipo", TIPOS[i % TIPOS.len()])
                .with("banco", BANCOS[i % BANCOS.len()])
                .with("valorConta", sign * (i % 1000) as f64)
                .with("aPagarReceber", sign * (i % 700) as f64)
        })
        .collect()
}

fn build_config(catalog: &FieldCatalog, calculated: bool) -> PivotConfig {
    let field = |id: &str| catalog.get(id).cloned().unwrap();
    let mut config = PivotConfig::new()
        .row(field("tipo"))
        .row(field("banco"))
        .column(field("dataPrevisao"))
        .measure(field("valorConta"))
        .measure(field("aPagarReceber"));
    if calculated {
        config = config.measure(field("calc_saldo"));
    }
    config.with_catalog(catalog)
}

fn pivot_calculations(c: &mut Criterion) {
    let mut catalog = FieldCatalog::financial();
    catalog
        .create_calculated_field(
            "calc_saldo",
            "Saldo",
            "IF(sum(\"Valor da Conta\") > 0, [Valor da Conta] - [A Pagar ou Receber], 0)",
        )
        .unwrap();

    let mut group = c.benchmark_group("pivot_calculations");
    for rows in [1_000usize, 10_000, 100_000] {
        let records = build_records(rows);
        group.throughput(Throughput::Elements(rows as u64));

        let base = build_config(&catalog, false);
        group.bench_with_input(BenchmarkId::new("base_measures", rows), &records, |b, records| {
            b.iter(|| aggregate(black_box(records), black_box(&base)).unwrap())
        });

        let calculated = build_config(&catalog, true);
        group.bench_with_input(
            BenchmarkId::new("calculated_measure", rows),
            &records,
            |b, records| b.iter(|| aggregate(black_box(records), black_box(&calculated)).unwrap()),
        );
    }
    group.finish();
}

criterion_group!(benches, pivot_calculations);
criterion_main!(benches);
