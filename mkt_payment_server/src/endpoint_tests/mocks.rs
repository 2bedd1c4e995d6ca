use mockall::mock;
use pay_provider_tools::{ChargeRequest, CoinbaseCharge, InvoiceRequest, NowPaymentsInvoice, ProviderApiError};

use crate::integrations::providers::{ChargeProvider, InvoiceProvider};

mock! {
    pub ChargeClient {}
    impl ChargeProvider for ChargeClient {
        async fn create_charge(&self, request: &ChargeRequest) -> Result<CoinbaseCharge, ProviderApiError>;
    }
}

mock! {
    pub InvoiceClient {}
    impl InvoiceProvider for InvoiceClient {
        async fn create_invoice(&self, request: &InvoiceRequest) -> Result<NowPaymentsInvoice, ProviderApiError>;
    }
}
