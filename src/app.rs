//! Service graph and route table.
//!
//! Both the binary and the HTTP tests build the ledger through [`Ledger::new`]
//! so they exercise the same wiring.

use std::sync::Arc;
use std::time::Duration;

use actix_web::web;

use crate::modules::gateways::{self, GatewayReconciler, PaymentGateway};
use crate::modules::health;
use crate::modules::invoices::{
    self, InvoiceRepository, InvoiceService, LedgerScheduler, OverdueSweeper,
};
use crate::modules::numbering::InvoiceNumberSequencer;
use crate::modules::payments::{self, PaymentRecorder};
use crate::store::DocumentStore;

/// Knobs for the service graph
#[derive(Debug, Clone, Copy)]
pub struct LedgerOptions {
    pub retry_limit: u32,
    pub numbering_retry_limit: u32,
    pub strict_numbering: bool,
}

impl Default for LedgerOptions {
    fn default() -> Self {
        Self {
            retry_limit: 5,
            numbering_retry_limit: 64,
            strict_numbering: false,
        }
    }
}

/// All ledger services over one document store
#[derive(Clone)]
pub struct Ledger {
    pub store: Arc<dyn DocumentStore>,
    pub invoice_repo: Arc<InvoiceRepository>,
    pub invoices: Arc<InvoiceService>,
    pub payments: Arc<PaymentRecorder>,
    pub sweeper: Arc<OverdueSweeper>,
    /// Present when a payment gateway is configured
    pub reconciler: Option<Arc<GatewayReconciler>>,
}

impl Ledger {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        options: LedgerOptions,
        gateway: Option<Arc<dyn PaymentGateway>>,
    ) -> Self {
        let invoice_repo = Arc::new(InvoiceRepository::new(store.clone(), options.retry_limit));
        let sequencer = Arc::new(InvoiceNumberSequencer::new(
            store.clone(),
            options.numbering_retry_limit,
        ));

        let mut invoice_service = InvoiceService::new(invoice_repo.clone(), sequencer)
            .with_strict_numbering(options.strict_numbering);
        if let Some(gateway) = &gateway {
            invoice_service = invoice_service.with_gateway(gateway.clone());
        }

        let payments = Arc::new(PaymentRecorder::new(invoice_repo.clone()));
        let reconciler = gateway
            .map(|gateway| Arc::new(GatewayReconciler::new(gateway, payments.clone())));

        Self {
            store,
            sweeper: Arc::new(OverdueSweeper::new(invoice_repo.clone())),
            invoices: Arc::new(invoice_service),
            invoice_repo,
            payments,
            reconciler,
        }
    }

    pub fn scheduler(&self, period: Duration) -> LedgerScheduler {
        LedgerScheduler::new(self.sweeper.clone(), self.invoice_repo.clone(), period)
    }

    /// Register shared state and the `/api` routes
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::Data::new(self.store.clone()))
            .app_data(web::Data::new(self.invoices.clone()))
            .app_data(web::Data::new(self.payments.clone()))
            .app_data(web::Data::new(self.sweeper.clone()));

        let reconciler = self.reconciler.clone();
        cfg.service(
            web::scope("/api")
                // Before the /invoices scope, which would otherwise claim the path
                .configure(payments::controllers::configure)
                .configure(invoices::controllers::configure)
                .configure(health::configure)
                .configure(move |cfg| {
                    if let Some(reconciler) = reconciler {
                        cfg.app_data(web::Data::new(reconciler));
                        gateways::configure(cfg);
                    }
                }),
        );
    }
}
