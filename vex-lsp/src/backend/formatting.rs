// LSP Formatting features

use tower_lsp::lsp_types::*;

use super::VexBackend;

impl VexBackend {
    pub async fn formatting(
        &self,
        _params: DocumentFormattingParams,
    ) -> tower_lsp::jsonrpc::Result<Option<Vec<TextEdit>>> {
        tracing::info!("formatting requested but no formatter is wired up yet");
        Ok(None)
    }

    pub async fn range_formatting(
        &self,
        params: DocumentRangeFormattingParams,
    ) -> tower_lsp::jsonrpc::Result<Option<Vec<TextEdit>>> {
        // For now, just format the entire document
        // TODO: Implement proper range formatting
        self.formatting(DocumentFormattingParams {
            text_document: params.text_document,
            options: params.options,
            work_done_progress_params: params.work_done_progress_params,
        })
        .await
    }
}
