pub mod mock_execution_server;
