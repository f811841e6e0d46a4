//! Solidity interfaces the bridge talks to.

use alloy_sol_types::sol;

sol! {
    /// One payment as stored by the processor.
    #[derive(Debug, PartialEq)]
    struct PaymentRecord {
        uint256 paymentId;
        address buyer;
        string productId;
        uint256 amount;
        address paymentToken;
        string currency;
        uint256 receiptId;
        string receiptCid;
        uint256 timestamp;
        bool completed;
    }

    #[derive(Debug, PartialEq)]
    interface IERC20 {
        function balanceOf(address owner) external view returns (uint256);
        function decimals() external view returns (uint8);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
        function transfer(address to, uint256 amount) external returns (bool);
    }

    #[derive(Debug, PartialEq)]
    interface IPaymentProcessor {
        function processPayment(
            string productId,
            uint256 amount,
            string receiptCid,
            address paymentToken,
            string currency
        ) external returns (uint256 paymentId, uint256 receiptId);

        function getPaymentDetails(uint256 paymentId) external view returns (PaymentRecord);
        function getPaymentsByBuyer(address buyer) external view returns (uint256[]);

        event PaymentProcessed(
            uint256 indexed paymentId,
            address indexed buyer,
            string productId,
            uint256 amount,
            address paymentToken,
            uint256 receiptId,
            string receiptCid,
            uint256 timestamp
        );
    }
}
